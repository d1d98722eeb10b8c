use crate::record::{Record, Value};
use crate::{Error, Result};
use std::collections::HashSet;

/// Postgres rejects statements binding more than `u16::MAX` parameters.
pub(crate) const MAX_BIND_PARAMS: usize = 65_535;

/// A batch of uniform records to merge into `table`, ignoring rows whose `key` already exists.
#[derive(Clone, Debug, PartialEq)]
pub struct UpsertRequest {
    table: String,
    key: Vec<String>,
    records: Vec<Record>,
}

impl UpsertRequest {
    /// Validates the batch:
    /// - at least one key column and one record,
    /// - every record carries the same columns, in the same order,
    /// - the key columns are among them and never NULL.
    ///
    /// Records repeating an earlier record's key are dropped here, so the statement inserts
    /// one row per distinct key.
    pub fn new<K, S>(table: impl Into<String>, key: K, records: Vec<Record>) -> Result<Self>
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table.into();
        let key: Vec<String> = key.into_iter().map(Into::into).collect();

        if key.is_empty() {
            return Err(Error::Schema(format!("upsert into {table} without a key")));
        }
        let Some(first) = records.first() else {
            return Err(Error::Schema(format!("upsert into {table} without records")));
        };
        if first.is_empty() {
            return Err(Error::Schema(format!("upsert into {table} with empty records")));
        }

        let columns = first.columns().to_vec();
        let mut key_positions = Vec::with_capacity(key.len());
        for k in &key {
            match columns.iter().position(|c| c == k) {
                Some(i) => key_positions.push(i),
                None => {
                    return Err(Error::Schema(format!(
                        "key column {k} is not among the columns of {table}: {columns:?}"
                    )))
                }
            }
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());
        for (n, record) in records.into_iter().enumerate() {
            if record.columns() != columns.as_slice() {
                return Err(Error::Schema(format!(
                    "record {n} for {table} has columns {:?}, expected {columns:?}",
                    record.columns()
                )));
            }

            let values = record.values();
            if let Some(&i) = key_positions.iter().find(|&&i| values[i].is_null()) {
                return Err(Error::Schema(format!(
                    "record {n} for {table} has a NULL key column {}",
                    columns[i]
                )));
            }

            // Display keeps variants apart: Text is quoted, numbers are not
            let fingerprint = key_positions
                .iter()
                .map(|&i| values[i].to_string())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            if seen.insert(fingerprint) {
                unique.push(record);
            }
        }

        Ok(Self {
            table,
            key,
            records: unique,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> &[String] {
        // `new` guarantees at least one record
        self.records[0].columns()
    }

    /// Values of the key columns of `record`, in key order.
    pub(crate) fn key_of<'a>(&self, record: &'a Record) -> Vec<&'a Value> {
        self.key
            .iter()
            .filter_map(|k| record.get(k))
            .collect()
    }

    /// Splits the batch into `INSERT .. ON CONFLICT DO NOTHING` statements, each binding at
    /// most [`MAX_BIND_PARAMS`] parameters.
    pub(crate) fn statements(&self) -> Result<Vec<Statement<'_>>> {
        let table = quote_table(&self.table)?;
        let columns = self
            .columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let key = self
            .key
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let rows_per_statement = (MAX_BIND_PARAMS / self.columns().len()).max(1);

        let statements = self
            .records
            .chunks(rows_per_statement)
            .map(|chunk| {
                let mut params: Vec<&Value> = Vec::new();
                let rows = chunk
                    .iter()
                    .map(|record| {
                        let cells = record
                            .values()
                            .iter()
                            .map(|value| match value.pg_cast() {
                                Some(cast) => {
                                    params.push(value);
                                    format!("${}::{cast}", params.len())
                                }
                                None => "NULL".to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("({cells})")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                Statement {
                    sql: format!(
                        "INSERT INTO {table} ({columns}) VALUES {rows} ON CONFLICT ({key}) DO NOTHING"
                    ),
                    params,
                }
            })
            .collect();

        Ok(statements)
    }
}

/// One parameterised statement of an upsert.
#[derive(Debug)]
pub(crate) struct Statement<'a> {
    pub(crate) sql: String,
    pub(crate) params: Vec<&'a Value>,
}

/// Double-quotes an identifier, escaping embedded quotes.
pub(crate) fn quote_ident(ident: &str) -> Result<String> {
    if ident.is_empty() || ident.contains('\0') {
        return Err(Error::Schema(format!("invalid identifier {ident:?}")));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

/// Quotes a possibly schema-qualified table name, e.g. `stock.prices`.
pub(crate) fn quote_table(table: &str) -> Result<String> {
    Ok(table
        .split('.')
        .map(quote_ident)
        .collect::<Result<Vec<_>>>()?
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(id: i64, text: &str) -> Record {
        Record::new()
            .with("twitter_id", id)
            .with("text", text)
            .with("followers", Value::Null)
    }

    #[test]
    fn builds_single_statement() {
        let request = UpsertRequest::new(
            "tweet_stream",
            ["twitter_id"],
            vec![tweet(1, "a"), tweet(2, "b")],
        )
        .unwrap();

        let statements = request.statements().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].sql,
            "INSERT INTO \"tweet_stream\" (\"twitter_id\", \"text\", \"followers\") \
             VALUES ($1::int8, $2::text, NULL), ($3::int8, $4::text, NULL) \
             ON CONFLICT (\"twitter_id\") DO NOTHING"
        );
        assert_eq!(
            statements[0].params,
            vec![
                &Value::Int(1),
                &Value::from("a"),
                &Value::Int(2),
                &Value::from("b")
            ]
        );
    }

    #[test]
    fn composite_key_and_qualified_table() {
        let record = Record::new()
            .with("ticker", "URA")
            .with("timestamp", chrono::DateTime::from_timestamp(1_650_000_000, 0).unwrap())
            .with("price", 24.1);
        let request =
            UpsertRequest::new("public.stock_price", ["ticker", "timestamp"], vec![record])
                .unwrap();

        let sql = &request.statements().unwrap()[0].sql;
        assert!(sql.starts_with("INSERT INTO \"public\".\"stock_price\""));
        assert!(sql.contains("($1::text, $2::timestamp, $3::float8)"));
        assert!(sql.ends_with("ON CONFLICT (\"ticker\", \"timestamp\") DO NOTHING"));
    }

    #[test]
    fn collapses_duplicate_keys() {
        let request = UpsertRequest::new(
            "tweet",
            ["twitter_id"],
            vec![tweet(7, "first"), tweet(8, "other"), tweet(7, "second")],
        )
        .unwrap();

        assert_eq!(request.records().len(), 2);
        assert_eq!(request.records()[0].get("text"), Some(&Value::from("first")));
    }

    #[test]
    fn text_and_int_keys_do_not_collide() {
        let a = Record::new().with("k", "1");
        let b = Record::new().with("k", 1i64);
        let request = UpsertRequest::new("t", ["k"], vec![a, b]).unwrap();
        assert_eq!(request.records().len(), 2);
    }

    #[test]
    fn rejects_invalid_batches() {
        assert!(matches!(
            UpsertRequest::new("tweet", ["twitter_id"], vec![]),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            UpsertRequest::new("tweet", Vec::<String>::new(), vec![tweet(1, "a")]),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            UpsertRequest::new("tweet", ["id"], vec![tweet(1, "a")]),
            Err(Error::Schema(_))
        ));

        let odd = Record::new().with("twitter_id", 2i64).with("text", "b");
        assert!(matches!(
            UpsertRequest::new("tweet", ["twitter_id"], vec![tweet(1, "a"), odd]),
            Err(Error::Schema(_))
        ));

        let null_key = Record::new()
            .with("twitter_id", Value::Null)
            .with("text", "a")
            .with("followers", Value::Null);
        assert!(matches!(
            UpsertRequest::new("tweet", ["twitter_id"], vec![null_key]),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn splits_at_bind_limit() {
        let records = (0..40_000).map(|i| tweet(i, "x")).collect();
        let request = UpsertRequest::new("tweet", ["twitter_id"], records).unwrap();

        let statements = request.statements().unwrap();
        // rows per statement are bounded by the column count: 65_535 / 3 = 21_845
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].params.len(), 2 * 21_845);
        assert!(statements.iter().all(|s| s.params.len() <= MAX_BIND_PARAMS));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("text").unwrap(), "\"text\"");
        assert_eq!(quote_ident("we\"ird").unwrap(), "\"we\"\"ird\"");
        assert!(quote_ident("").is_err());
        assert!(quote_table("a..b").is_err());
    }
}
