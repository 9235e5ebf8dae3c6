use std::collections::BTreeSet;
use std::fmt;

/// 通配符：匹配所有扩展名
pub const WILDCARD: &str = "*";

/// 分类结果：文件由哪个后端负责
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// mmap 后端（主）
    Mapped,
    /// 缓冲 I/O 后端（副）
    Buffered,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Mapped => f.write_str("mapped"),
            Route::Buffered => f.write_str("buffered"),
        }
    }
}

/// 预加载扩展名集合（构造后不可变）
///
/// 元素按字面值比较：`".dvd"`、`"DVD"` 都不会匹配 `x.dvd`。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreloadExtensions {
    exts: BTreeSet<String>,
}

impl PreloadExtensions {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exts: exts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }

    pub fn contains_wildcard(&self) -> bool {
        self.exts.contains(WILDCARD)
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.exts.contains(ext)
    }

    pub fn len(&self) -> usize {
        self.exts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exts.iter().map(String::as_str)
    }

    /// 对文件名分类；纯函数，同一输入永远得到同一结果。
    pub fn classify(&self, file_name: &str) -> Route {
        classify(file_name, self)
    }
}

impl fmt::Display for PreloadExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for ext in &self.exts {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(ext)?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for PreloadExtensions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// 最后一个 `.` 之后的部分；没有 `.` 时为空串。
pub fn extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(i) => &file_name[i + 1..],
        None => "",
    }
}

pub fn classify(file_name: &str, exts: &PreloadExtensions) -> Route {
    if exts.is_empty() {
        return Route::Buffered;
    }
    if exts.contains_wildcard() {
        return Route::Mapped;
    }
    let ext = extension(file_name);
    // 无扩展名的文件（如 segments_N）总是 Buffered，即使集合里配了空串
    if !ext.is_empty() && exts.contains(ext) {
        Route::Mapped
    } else {
        Route::Buffered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_after_last_dot() {
        assert_eq!(extension("_0.dvd"), "dvd");
        assert_eq!(extension("_0_Lucene90_0.tar.gz"), "gz");
        assert_eq!(extension("segments_3"), "");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn empty_set_routes_everything_buffered() {
        let exts = PreloadExtensions::empty();
        for name in ["_0.dvd", "_0.doc", "segments_1", "write.lock"] {
            assert_eq!(classify(name, &exts), Route::Buffered);
        }
    }

    #[test]
    fn wildcard_dominates() {
        let exts = PreloadExtensions::new(["*", "dvd"]);
        for name in ["_0.dvd", "_0.doc", "segments_1", "", "a.b.c", ".hidden"] {
            assert_eq!(classify(name, &exts), Route::Mapped, "{name}");
        }
    }

    #[test]
    fn partition_by_membership() {
        let exts = PreloadExtensions::new(["dvd", "tim"]);
        assert_eq!(classify("_0.dvd", &exts), Route::Mapped);
        assert_eq!(classify("_0.tim", &exts), Route::Mapped);
        assert_eq!(classify("_0.doc", &exts), Route::Buffered);
        assert_eq!(classify("dvd", &exts), Route::Buffered);
        assert_eq!(classify("segments_2", &exts), Route::Buffered);
    }

    #[test]
    fn extensions_are_literal() {
        let exts = PreloadExtensions::new([".dvd", "DVD"]);
        assert_eq!(classify("_0.dvd", &exts), Route::Buffered);
        assert_eq!(classify("_0.DVD", &exts), Route::Mapped);
    }

    #[test]
    fn classification_is_stable() {
        let exts = PreloadExtensions::new(["nvd", "dvd"]);
        let names = ["_0.nvd", "_1.doc", "segments_9", "_2.dvd", "x"];
        let first: Vec<Route> = names.iter().map(|n| exts.classify(n)).collect();
        for _ in 0..100 {
            let again: Vec<Route> = names.iter().map(|n| exts.classify(n)).collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn display_is_comma_separated_and_sorted() {
        let exts: PreloadExtensions = ["tim", "dvd"].into_iter().collect();
        assert_eq!(exts.to_string(), "dvd,tim");
        assert_eq!(exts.len(), 2);
    }
}
