use crate::error::Result;
use brain_types::Node;
use std::path::{Path, PathBuf};

/// Where a node's blob lives under `data_dir` (§6: `nodes/YYYY/MM/<id>-v<version>.json`).
pub fn blob_path(data_dir: &Path, node: &Node) -> PathBuf {
    let year = node.metadata.analyzed_at.format("%Y");
    let month = node.metadata.analyzed_at.format("%m");
    data_dir
        .join("nodes")
        .join(year.to_string())
        .join(month.to_string())
        .join(format!("{}-v{}.json", node.id.as_str(), node.version))
}

/// Write a node's blob, via a temp file in the same directory renamed
/// into place on success (§4.3: "written first to a temporary name and
/// renamed on success").
pub fn write_blob(path: &Path, node: &Node) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        crate::error::Error::Internal(format!("blob path {} has no parent", path.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".{}.tmp", node.id.as_str()));
    let json = serde_json::to_vec_pretty(node)?;
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Remove a blob that was written but whose transaction failed to
/// commit (§4.3: "if the transaction fails, the blob file is removed").
pub fn remove_blob(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub fn read_blob(path: &Path) -> Result<Node> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Walk every node blob under `data_dir/nodes` in no particular order,
/// for `rebuild-index` (§4.3).
pub fn walk_blobs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let nodes_dir = data_dir.join("nodes");
    if !nodes_dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(&nodes_dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
        {
            paths.push(entry.path().to_path_buf());
        }
    }
    Ok(paths)
}
