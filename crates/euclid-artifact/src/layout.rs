//! Object key conventions.
//!
//! ```text
//! input/<ISO-8601 timestamp>.json   the ingested request body
//! output/<same file name>           the computed result for that request
//! ```
//!
//! The output key is derived from the input key alone so that whoever holds
//! the ingest result (the engine, a polling client, the compute task) can
//! find the output without further coordination.

use chrono::{DateTime, SecondsFormat, Utc};

pub const INPUT_PREFIX: &str = "input/";
pub const OUTPUT_PREFIX: &str = "output/";

/// Key for an ingested request received at `at`.
///
/// Microsecond precision keeps concurrent requests on separate keys.
pub fn input_key(at: DateTime<Utc>) -> String {
  format!(
    "{}{}.json",
    INPUT_PREFIX,
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
  )
}

/// Key for the result of the request stored under `input_key`.
pub fn output_key(input_key: &str) -> String {
  let file_name = input_key.rsplit('/').next().unwrap_or(input_key);
  format!("{}{}", OUTPUT_PREFIX, file_name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_input_key_is_iso_timestamp() {
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 9).unwrap();
    assert_eq!(input_key(at), "input/2024-03-05T14:30:09.000000Z.json");
  }

  #[test]
  fn test_output_key_mirrors_input() {
    assert_eq!(
      output_key("input/2024-03-05T14:30:09.000000Z.json"),
      "output/2024-03-05T14:30:09.000000Z.json"
    );
    assert_eq!(output_key("bare.json"), "output/bare.json");
  }
}
