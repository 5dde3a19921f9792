//! Common routines for reading input files.
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

/// A standard error message prefix for a problem reading a file
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().to_string_lossy())
}

/// Parse a TOML file into a struct of type `T`.
///
/// # Arguments
///
/// * `file_path`: Path to the TOML file
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    toml::from_str(&contents).with_context(|| input_err_msg(file_path))
}

/// Read a series of records of type `T` from a CSV file.
///
/// The returned vector may be empty; callers decide whether that is an error.
///
/// # Arguments
///
/// * `file_path`: Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        let record: T = record.with_context(|| input_err_msg(file_path))?;
        records.push(record);
    }

    Ok(records)
}

/// Read an optional number that may arrive as text.
///
/// UI form fields submit numbers as strings, sometimes with thousands
/// separators. An absent value or an empty string deserialises to `None`.
pub fn deserialise_optional_number<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Number(f64),
        Text(String),
    }

    match Option::<Flexible>::deserialize(deserialiser)? {
        None => Ok(None),
        Some(Flexible::Number(value)) => Ok(Some(value)),
        Some(Flexible::Text(text)) => {
            let text = text.replace(',', "");
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }

            text.parse()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("Invalid number: \"{text}\"")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use serde::Deserialize;
    use serde_json::json;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: u32,
        name: String,
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("records.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "id,name
1,first
2,second"
        )
        .unwrap();

        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            vec![
                Record {
                    id: 1,
                    name: "first".to_string()
                },
                Record {
                    id: 2,
                    name: "second".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_read_csv_missing_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nope.csv");
        assert_error!(
            read_csv::<Record>(&file_path),
            input_err_msg(&file_path).as_str()
        );
    }

    #[test]
    fn test_read_toml() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Config {
            name: String,
            threshold: f64,
        }

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "name = \"example\"
threshold = 2.5"
        )
        .unwrap();

        let config: Config = read_toml(&file_path).unwrap();
        assert_eq!(
            config,
            Config {
                name: "example".to_string(),
                threshold: 2.5
            }
        );

        writeln!(file, "not valid toml").unwrap();
        assert_error!(
            read_toml::<Config>(&file_path),
            input_err_msg(&file_path).as_str()
        );
    }

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialise_optional_number")]
        value: Option<f64>,
    }

    #[test]
    fn test_deserialise_optional_number() {
        let holder: Holder = serde_json::from_value(json!({"value": 1500.5})).unwrap();
        assert_eq!(holder.value, Some(1500.5));

        let holder: Holder = serde_json::from_value(json!({"value": "1,500.5"})).unwrap();
        assert_eq!(holder.value, Some(1500.5));

        let holder: Holder = serde_json::from_value(json!({"value": " "})).unwrap();
        assert_eq!(holder.value, None);

        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert_eq!(holder.value, None);

        assert!(serde_json::from_value::<Holder>(json!({"value": "lots"})).is_err());
    }
}
