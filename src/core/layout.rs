use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StoreError};

/// 副后端的兄弟目录名：`.../<node>/indices.io/<uuid>/<shard>/index`
pub const SECONDARY_DIR_NAME: &str = "indices.io";

/// 主路径末尾固定的分片结构段数：`indices/<uuid>/<shard>/index`
const TAIL_SEGMENTS: usize = 4;

/// 纯计算：由主路径推导副后端路径（不触碰文件系统）。
///
/// 保留末尾 4 段之前的全部前缀，接上 [`SECONDARY_DIR_NAME`]，
/// 再接回末尾 4 段中的后 3 段。
pub fn secondary_path_for(primary: &Path) -> Result<PathBuf> {
    let comps: Vec<Component<'_>> = primary.components().collect();
    let root_len = comps
        .iter()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .count();
    let names = &comps[root_len..];
    if names.len() <= TAIL_SEGMENTS {
        return Err(StoreError::InvalidLocation {
            path: primary.to_path_buf(),
            reason: "expected at least one parent above <indices>/<uuid>/<shard>/<dir>",
        });
    }

    let n = names.len();
    let mut out = PathBuf::new();
    for c in &comps[..root_len] {
        out.push(c.as_os_str());
    }
    for c in &names[..n - TAIL_SEGMENTS] {
        out.push(c.as_os_str());
    }
    out.push(SECONDARY_DIR_NAME);
    for c in &names[n - (TAIL_SEGMENTS - 1)..] {
        out.push(c.as_os_str());
    }
    Ok(out)
}

/// 推导副后端路径并确保目录存在（幂等）。
pub fn derive_secondary_path(primary: &Path) -> Result<PathBuf> {
    let secondary = secondary_path_for(primary)?;
    std::fs::create_dir_all(&secondary).map_err(|e| StoreError::io(&secondary, e))?;
    tracing::debug!("secondary path for {:?} -> {:?}", primary, secondary);
    Ok(secondary)
}
