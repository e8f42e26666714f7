//! Parser for pacman `desc` records.
//!
//! ```text
//! %NAME%
//! linux-cachyos
//!
//! %VERSION%
//! 6.9.1-2
//! ```
//!
//! Each `%KEY%` header is followed by one value per line until a blank line.

use crate::error::CommonError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescRecord {
    fields: BTreeMap<String, Vec<String>>,
}

impl DescRecord {
    pub fn parse(text: &str) -> Result<Self, CommonError> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() {
                current = None;
                continue;
            }

            if let Some(key) = section_key(line) {
                fields.entry(key.to_string()).or_default();
                current = Some(key.to_string());
                continue;
            }

            match &current {
                Some(key) => fields.entry(key.clone()).or_default().push(line.to_string()),
                None => {
                    return Err(CommonError::MalformedDesc {
                        line: index + 1,
                        message: format!("value '{}' outside of a %SECTION%", line),
                    });
                }
            }
        }

        Ok(Self { fields })
    }

    /// First value of a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn require(&self, key: &str) -> Result<&str, CommonError> {
        self.get(key).ok_or_else(|| CommonError::MissingField {
            field: key.to_string(),
        })
    }

    pub fn name(&self) -> Result<&str, CommonError> {
        self.require("NAME")
    }

    pub fn version(&self) -> Result<&str, CommonError> {
        self.require("VERSION")
    }

    pub fn base(&self) -> Option<&str> {
        self.get("BASE")
    }

    pub fn description(&self) -> Option<&str> {
        self.get("DESC")
    }
}

fn section_key(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('%')?.strip_suffix('%')?;
    if !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        Some(inner)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_CACHYOS: &str = "%FILENAME%\nlinux-cachyos-6.9.1-2-x86_64_v3.pkg.tar.zst\n\n\
%NAME%\nlinux-cachyos\n\n%BASE%\nlinux-cachyos\n\n%VERSION%\n6.9.1-2\n\n\
%DESC%\nThe Linux BORE + LTO + Cachy Sauce Kernel by CachyOS\n\n\
%DEPENDS%\ncoreutils\nkmod\ninitramfs\n\n";

    #[test]
    fn parses_common_fields() {
        let record = DescRecord::parse(LINUX_CACHYOS).unwrap();
        assert_eq!(record.name().unwrap(), "linux-cachyos");
        assert_eq!(record.version().unwrap(), "6.9.1-2");
        assert_eq!(record.base(), Some("linux-cachyos"));
        assert!(record.description().unwrap().contains("BORE"));
    }

    #[test]
    fn collects_multi_value_fields() {
        let record = DescRecord::parse(LINUX_CACHYOS).unwrap();
        assert_eq!(record.values("DEPENDS"), ["coreutils", "kmod", "initramfs"]);
        assert!(record.values("OPTDEPENDS").is_empty());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let record = DescRecord::parse("%NAME%\nlinux\n").unwrap();
        let err = record.version().unwrap_err();
        assert!(err.to_string().contains("%VERSION%"));
    }

    #[test]
    fn value_outside_section_is_rejected() {
        let err = DescRecord::parse("linux\n%NAME%\nlinux\n").unwrap_err();
        assert!(matches!(err, CommonError::MalformedDesc { line: 1, .. }));
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let record = DescRecord::parse("%NAME%\r\nlinux-zen\r\n\r\n%VERSION%\r\n6.9.1.zen1-1\r\n").unwrap();
        assert_eq!(record.name().unwrap(), "linux-zen");
        assert_eq!(record.version().unwrap(), "6.9.1.zen1-1");
    }
}
