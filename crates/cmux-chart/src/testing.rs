//! # Test Fixtures
//!
//! Builds chart archives and provenance files in memory, so tests never
//! depend on fixture files on disk. Enabled for this crate's own tests and,
//! through the `testing` feature, for downstream crates' tests.

use cmux_core::ChartMetadata;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Package `files` (path, contents) into a gzipped tar archive.
pub fn package_files(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .expect("append to in-memory tar");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Package a minimal chart with the given metadata.
pub fn package_chart(metadata: &ChartMetadata) -> Vec<u8> {
    let chart_yaml = serde_yaml::to_string(metadata).expect("serialize Chart.yaml");
    let name = &metadata.name;
    let chart_path = format!("{name}/Chart.yaml");
    let values_path = format!("{name}/values.yaml");
    let notes_path = format!("{name}/templates/NOTES.txt");
    package_files(&[
        (chart_path.as_str(), chart_yaml.as_str()),
        (values_path.as_str(), "replicaCount: 1\n"),
        (notes_path.as_str(), "Thank you for installing this chart.\n"),
    ])
}

/// Build an (unsigned) provenance document for `metadata` and `archive`.
pub fn provenance_for(metadata: &ChartMetadata, archive: &[u8]) -> Vec<u8> {
    let chart_yaml = serde_yaml::to_string(metadata).expect("serialize Chart.yaml");
    format!(
        "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA512\n\n{chart_yaml}...\nfiles:\n  {file}: sha256:{digest}\n-----BEGIN PGP SIGNATURE-----\n\nwsBcBAEBCgAQBQJbZ0AAAAoJEFIXVFmGbBPyAAAAAA==\n-----END PGP SIGNATURE-----\n",
        file = metadata.archive_filename(),
        digest = cmux_core::sha256_hex(archive),
    )
    .into_bytes()
}
