use std::fmt;
use std::path::PathBuf;

use crate::core::Route;

/// 单个后端的资源统计
#[derive(Clone, Debug)]
pub struct DirectoryStats {
    pub route: Route,
    pub root: PathBuf,
    /// 根目录下的文件数
    pub file_count: usize,
    /// 文件总字节数
    pub total_bytes: u64,
    pub preload: bool,
    /// 映射区表条目数（仅 mapped）
    pub mapped_regions: usize,
    pub mapped_bytes: u64,
    /// 存活读句柄（仅 buffered）
    pub open_inputs: usize,
}

/// 整个存储目录的统计；未切换时 `secondary` 为 None
#[derive(Clone, Debug)]
pub struct StoreStats {
    pub primary: DirectoryStats,
    pub secondary: Option<DirectoryStats>,
    /// 两个后端里同时存在的文件名
    pub conflicts: Vec<String>,
}

impl StoreStats {
    /// 去重后的逻辑文件数。三次列举互不原子，并发修改下可能偏差，但不会下溢。
    pub fn file_count(&self) -> usize {
        (self.primary.file_count + self.secondary.as_ref().map(|s| s.file_count).unwrap_or(0))
            .saturating_sub(self.conflicts.len())
    }
}

fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl fmt::Display for DirectoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ {} backend:", self.route)?;
        writeln!(f, "║   root:         {}", self.root.display())?;
        writeln!(
            f,
            "║   files:        {:>10}  ({:>10})",
            self.file_count,
            human_bytes(self.total_bytes)
        )?;
        match self.route {
            Route::Mapped => {
                writeln!(f, "║   preload:      {:>10}", self.preload)?;
                writeln!(
                    f,
                    "║   regions:      {:>10}  ({:>10})",
                    self.mapped_regions,
                    human_bytes(self.mapped_bytes)
                )?;
            }
            Route::Buffered => {
                writeln!(f, "║   open inputs:  {:>10}", self.open_inputs)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           switchfs Store Report                  ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        write!(f, "{}", self.primary)?;
        if let Some(secondary) = &self.secondary {
            writeln!(f, "╠──────────────────────────────────────────────────╣")?;
            write!(f, "{}", secondary)?;
        }
        if !self.conflicts.is_empty() {
            writeln!(f, "╠──────────────────────────────────────────────────╣")?;
            writeln!(f, "║ conflicts (in both backends): {}", self.conflicts.len())?;
            for name in &self.conflicts {
                writeln!(f, "║   {}", name)?;
            }
        }
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(route: Route, files: usize, bytes: u64) -> DirectoryStats {
        DirectoryStats {
            route,
            root: PathBuf::from("/data/x"),
            file_count: files,
            total_bytes: bytes,
            preload: route == Route::Mapped,
            mapped_regions: 1,
            mapped_bytes: 2048,
            open_inputs: 3,
        }
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(12), "12 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn file_count_discounts_conflicts() {
        let s = StoreStats {
            primary: stats(Route::Mapped, 4, 10),
            secondary: Some(stats(Route::Buffered, 3, 10)),
            conflicts: vec!["_0.doc".into()],
        };
        assert_eq!(s.file_count(), 6);
        let report = s.to_string();
        assert!(report.contains("mapped backend"));
        assert!(report.contains("buffered backend"));
        assert!(report.contains("_0.doc"));
    }

    #[test]
    fn file_count_saturates_when_listings_drift() {
        // 冲突列表与计数来自不同时刻的列举
        let s = StoreStats {
            primary: stats(Route::Mapped, 0, 0),
            secondary: Some(stats(Route::Buffered, 1, 1)),
            conflicts: vec!["_0.doc".into(), "_1.doc".into()],
        };
        assert_eq!(s.file_count(), 0);
        assert!(s.to_string().contains("_1.doc"));
    }

    #[test]
    fn mapped_only_report() {
        let s = StoreStats {
            primary: stats(Route::Mapped, 2, 4096),
            secondary: None,
            conflicts: Vec::new(),
        };
        assert_eq!(s.file_count(), 2);
        let report = s.to_string();
        assert!(report.contains("4.00 KB"));
        assert!(!report.contains("buffered"));
    }
}
