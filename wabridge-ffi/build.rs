//! Build script for wabridge-ffi.
//!
//! Generates the C header `wabridge.h` with `cbindgen`.
//!
//! # Environment variables
//!
//! - `WABRIDGE_HEADER_DIR`: directory to copy the generated header into,
//!   for hosts that vendor it. The header is always written to `OUT_DIR`.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-env-changed=WABRIDGE_HEADER_DIR");

    let crate_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let header = out_dir.join("wabridge.h");

    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")).unwrap_or_default();
    match cbindgen::generate_with_config(&crate_dir, config) {
        Ok(bindings) => {
            bindings.write_to_file(&header);
        }
        Err(e) => {
            // A header failure must not break the library build.
            println!("cargo:warning=cbindgen failed: {e}");
            return;
        }
    }

    if let Ok(dir) = env::var("WABRIDGE_HEADER_DIR") {
        let dest = PathBuf::from(dir).join("wabridge.h");
        if let Err(e) = std::fs::copy(&header, &dest) {
            println!("cargo:warning=copying header to {}: {e}", dest.display());
        }
    }
}
