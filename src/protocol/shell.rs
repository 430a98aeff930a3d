//! Framing and scraping for shell-style firmware.
//!
//! The shell prints human-oriented reports; machine access means sending a
//! line command and scraping the text that comes back. Output arrives in
//! unpredictable chunks with CR/LF noise and pagination, so parsing works
//! on accumulated text and tolerates junk lines between the sections it
//! cares about.
//!
//! A typical report:
//!
//! ```text
//! Edfa 1 State
//!   GainValue        : 17.5dB
//!   InputTotalPower  : -3.2dBm
//! Edfa 1 Config
//!   GainSetPoint     : 17.5dB
//!   Mode             : ConstantGain
//! ```
//!
//! Values carry unit suffixes (`17.5dB`, `-3.2dBm`); a regex splits them
//! into number and unit so callers get typed quantities.

use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::ShellSettings;
use crate::error::{HalError, Result};
use crate::params::ParamValue;
use crate::session::Session;

/// Frames line commands and reads chunked shell output.
#[derive(Clone, Debug)]
pub struct ShellFramer {
    recv_buffer: usize,
}

impl ShellFramer {
    pub fn new(settings: &ShellSettings) -> Self {
        Self {
            recv_buffer: settings.recv_buffer,
        }
    }

    /// Send one line command, newline-terminated.
    pub async fn send_line(&self, session: &mut Session, line: &str) -> Result<()> {
        debug!("-> {line}");
        session.send(format!("{line}\n").as_bytes()).await
    }

    /// Read one chunk of shell output (the transport blocks, polling, until
    /// the shell has something ready).
    pub async fn read_chunk(&self, session: &mut Session) -> Result<String> {
        let chunk = session.recv(self.recv_buffer).await?;
        let text = String::from_utf8_lossy(&chunk).into_owned();
        debug!("<- {} bytes of shell output", text.len());
        Ok(text)
    }

    /// Send a command and return the first chunk of its output.
    pub async fn command(&self, session: &mut Session, line: &str) -> Result<String> {
        self.send_line(session, line).await?;
        self.read_chunk(session).await
    }

    /// Send a command and read a paginated report: after the first chunk, a
    /// space advances the pager and the continuation is appended. Section
    /// scraping tolerates the pager residue between the chunks.
    pub async fn command_paged(&self, session: &mut Session, line: &str) -> Result<String> {
        self.send_line(session, line).await?;
        let mut output = self.read_chunk(session).await?;
        session.send(b" ").await?;
        match self.read_chunk(session).await {
            Ok(continuation) => output.push_str(&continuation),
            // A short report has no second page.
            Err(HalError::Timeout(_)) => {}
            Err(e) => return Err(e),
        }
        session.drain().await?;
        Ok(output)
    }
}

/// Split `text` into the sections following each occurrence of `sentinel`,
/// dropping everything before the first one.
pub fn split_sections<'a>(text: &'a str, sentinel: &str) -> Vec<&'a str> {
    text.split(sentinel).skip(1).collect()
}

/// Scrape `Key : Value` lines out of a report section.
///
/// Keys and values are stripped of CR and blanks; lines that do not look
/// like a labelled value (pager residue, rulers, echoes) are skipped.
pub fn parse_labeled_block(section: &str) -> HashMap<String, ParamValue> {
    let mut values = HashMap::new();
    for line in section.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        let value: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        values.insert(key, split_value_unit(&value));
    }
    values
}

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // A number followed by a unit suffix, e.g. "17.5dB", "-3.2dBm".
        Regex::new(r"^(-?\d+\.?\d*)([a-zA-Z]+)$").expect("quantity pattern is valid")
    })
}

/// Split a scraped token into a typed value: `17.5dB` becomes a quantity,
/// `-3` a float, anything else stays text.
pub fn split_value_unit(token: &str) -> ParamValue {
    if let Some(captures) = quantity_regex().captures(token) {
        if let Ok(value) = captures[1].parse::<f64>() {
            return ParamValue::Quantity {
                value,
                unit: captures[2].to_string(),
            };
        }
    }
    if let Ok(value) = token.parse::<f64>() {
        return ParamValue::Float(value);
    }
    ParamValue::Text(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "show edfa 1\r\n\
        Edfa 1 State\r\n\
        State            : InService\r\n\
        GainValue        : 17.5dB\r\n\
        TiltValue        : -0.7dB\r\n\
        InputTotalPower  : -3.2dBm\r\n\
        OutputTotalPower : 14.3dBm\r\n\
        --More--\r\n\
        Edfa 1 Config\r\n\
        GainSetPoint     : 17.5dB\r\n\
        TiltSetPoint     : -0.7dB\r\n\
        OutputEnable     : enable\r\n\
        GainRange        : high\r\n\
        Mode             : ConstantGain\r\n\
        ->";

    #[test]
    fn test_split_sections() {
        let sections = split_sections(REPORT, "Edfa");
        assert_eq!(sections.len(), 2);
        assert!(sections[0].contains("GainValue"));
        assert!(sections[1].contains("GainSetPoint"));
    }

    #[test]
    fn test_parse_labeled_block() {
        let sections = split_sections(REPORT, "Edfa");
        let state = parse_labeled_block(sections[0]);

        assert_eq!(
            state.get("GainValue"),
            Some(&ParamValue::Quantity {
                value: 17.5,
                unit: "dB".to_string()
            })
        );
        assert_eq!(
            state.get("InputTotalPower"),
            Some(&ParamValue::Quantity {
                value: -3.2,
                unit: "dBm".to_string()
            })
        );
        assert_eq!(
            state.get("State"),
            Some(&ParamValue::Text("InService".to_string()))
        );
        // The pager marker is not a labelled value.
        assert!(!state.contains_key("--More--"));
    }

    #[test]
    fn test_split_value_unit() {
        assert_eq!(
            split_value_unit("-12.5dBm"),
            ParamValue::Quantity {
                value: -12.5,
                unit: "dBm".to_string()
            }
        );
        assert_eq!(split_value_unit("3"), ParamValue::Float(3.0));
        assert_eq!(
            split_value_unit("enable"),
            ParamValue::Text("enable".to_string())
        );
    }
}
