//! # Provenance Files
//!
//! A `.prov` file is an OpenPGP clear-signed document. The signed body is
//! the chart's `Chart.yaml` followed by a `...` document separator and a
//! `files:` map of archive digests:
//!
//! ```text
//! -----BEGIN PGP SIGNED MESSAGE-----
//! Hash: SHA512
//!
//! name: mychart
//! version: 0.1.0
//! ...
//! files:
//!   mychart-0.1.0.tgz: sha256:...
//! -----BEGIN PGP SIGNATURE-----
//! ```
//!
//! Only the chart identity is read here. Signature verification belongs to
//! clients, which hold the keyring.

use cmux_core::ChartMetadata;

use crate::ExtractError;

const SIGNED_MESSAGE_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN PGP SIGNATURE-----";
const YAML_DOCUMENT_END: &str = "...";

/// Read chart name and version from a provenance file.
pub fn parse(provenance: &[u8]) -> Result<ChartMetadata, ExtractError> {
    let text = std::str::from_utf8(provenance)
        .map_err(|_| ExtractError::InvalidProvenance("not UTF-8".to_string()))?;

    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    lines
        .by_ref()
        .find(|l| l.trim() == SIGNED_MESSAGE_HEADER)
        .ok_or_else(|| ExtractError::InvalidProvenance("missing signed message header".to_string()))?;

    // Armor headers (`Hash: SHA512`) run until the first blank line.
    lines
        .by_ref()
        .find(|l| l.trim().is_empty())
        .ok_or_else(|| ExtractError::InvalidProvenance("missing signed message body".to_string()))?;

    let mut body = String::new();
    for line in lines {
        if line == YAML_DOCUMENT_END || line.trim() == SIGNATURE_HEADER {
            break;
        }
        // Dash-escaped lines (RFC 4880 §7.1).
        let line = line.strip_prefix("- ").unwrap_or(line);
        body.push_str(line);
        body.push('\n');
    }
    if body.trim().is_empty() {
        return Err(ExtractError::InvalidProvenance(
            "empty signed message body".to_string(),
        ));
    }

    let metadata: ChartMetadata = serde_yaml::from_str(&body).map_err(|e| {
        ExtractError::InvalidProvenance(format!("signed body is not chart metadata: {e}"))
    })?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::provenance_for;

    #[test]
    fn reads_name_and_version() {
        let meta = ChartMetadata::new("mychart", "0.1.0");
        let prov = provenance_for(&meta, b"archive bytes");
        let parsed = parse(&prov).unwrap();
        assert_eq!(parsed.name, "mychart");
        assert_eq!(parsed.version, "0.1.0");
    }

    #[test]
    fn crlf_line_endings_accepted() {
        let meta = ChartMetadata::new("mychart", "0.1.0");
        let prov = String::from_utf8(provenance_for(&meta, b"x"))
            .unwrap()
            .replace('\n', "\r\n");
        assert_eq!(parse(prov.as_bytes()).unwrap().version, "0.1.0");
    }

    #[test]
    fn missing_header_rejected() {
        let err = parse(b"name: mychart\nversion: 0.1.0\n").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidProvenance(_)));
    }

    #[test]
    fn empty_body_rejected() {
        let doc = format!("{SIGNED_MESSAGE_HEADER}\nHash: SHA512\n\n...\nfiles: {{}}\n");
        assert!(matches!(
            parse(doc.as_bytes()).unwrap_err(),
            ExtractError::InvalidProvenance(_)
        ));
    }

    #[test]
    fn body_without_version_rejected() {
        let doc = format!("{SIGNED_MESSAGE_HEADER}\nHash: SHA512\n\nname: mychart\n...\n");
        assert!(matches!(
            parse(doc.as_bytes()).unwrap_err(),
            ExtractError::InvalidMetadata(_)
        ));
    }
}
