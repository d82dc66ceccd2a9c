use anyhow::Result;
use fs_extra::{copy_items, dir::CopyOptions};
use std::{env, path::PathBuf};

/// Copies `assets/` (models and environment maps) next to the build output.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets/*");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets = manifest_dir.join("assets");
    if !assets.exists() {
        return Ok(());
    }

    let mut options = CopyOptions::new();
    options.overwrite = true;
    copy_items(&[assets], env::var("OUT_DIR")?, &options)?;
    Ok(())
}
