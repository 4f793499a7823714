#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let mut file = match NamedTempFile::with_suffix(".stl") {
        Ok(f) => f,
        Err(_) => return,
    };

    if file.write_all(data).is_err() {
        return;
    }

    // Loading must never panic; a successful load must have valid indices.
    if let Ok(mesh) = mesh_supports::load_stl(file.path()) {
        assert!(mesh.validate_indices().is_ok());
    }
});
