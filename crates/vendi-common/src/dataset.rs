use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    /// Storage path on the platform side.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Encode rows as JSON-lines, the only upload format the platform accepts.
pub fn to_json_lines(rows: &[Value]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// Decode a JSON-lines body, skipping blank lines.
pub fn from_json_lines(body: &str) -> Result<Vec<Value>, serde_json::Error> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_one_row_per_line() {
        let rows = vec![
            serde_json::json!({"messages": [{"role": "user", "content": "a"}]}),
            serde_json::json!({"messages": [{"role": "user", "content": "b\nc"}]}),
        ];
        let body = to_json_lines(&rows).unwrap();
        assert_eq!(body.lines().count(), 2);
        assert_eq!(from_json_lines(&body).unwrap(), rows);
    }

    #[test]
    fn test_from_json_lines_skips_blank() {
        let rows = from_json_lines("{\"a\":1}\n\n  \n{\"a\":2}\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(from_json_lines("{not json}").is_err());
    }
}
