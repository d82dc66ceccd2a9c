/**
 * This module contains all logic for loading models and images from external files.
 */
pub mod cache;
pub mod gltf;
pub mod loader;
pub mod texture;

/// Where asset paths are resolved from.
///
/// On native targets this is a directory on disk; on the web it is a path
/// below the page origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRoot(pub String);

impl Default for AssetRoot {
    fn default() -> Self {
        Self("assets".to_string())
    }
}

impl From<&str> for AssetRoot {
    fn from(root: &str) -> Self {
        Self(root.to_string())
    }
}

/// Resolves `uri` relative to the directory of `path`.
pub fn sibling_path(path: &str, uri: &str) -> String {
    match path.rfind('/') {
        Some(idx) => format!("{}/{}", &path[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &AssetRoot, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.0.trim_matches('/')))?;
    Ok(base.join(file_name.trim_start_matches("./"))?)
}

pub async fn load_binary(root: &AssetRoot, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(&root.0).join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?
    };

    Ok(data)
}
