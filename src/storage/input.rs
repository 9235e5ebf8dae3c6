use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::core::Route;

/// 缓冲读块大小
pub const BUFFER_SIZE: usize = 16 * 1024;

/// 只读句柄：由服务它的后端创建，归调用方所有。
///
/// drop 句柄不会关闭后端；后端 close 之后，已打开的句柄仍可继续读。
pub enum IndexInput {
    Mapped(MmapInput),
    Buffered(BufferedInput),
}

impl IndexInput {
    pub fn name(&self) -> &str {
        match self {
            IndexInput::Mapped(i) => &i.name,
            IndexInput::Buffered(i) => &i.name,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            IndexInput::Mapped(i) => i.len(),
            IndexInput::Buffered(i) => i.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn route(&self) -> Route {
        match self {
            IndexInput::Mapped(_) => Route::Mapped,
            IndexInput::Buffered(_) => Route::Buffered,
        }
    }

    /// 读完剩余全部字节
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len() as usize);
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for IndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            IndexInput::Mapped(i) => i.read(buf),
            IndexInput::Buffered(i) => i.reader.read(buf),
        }
    }
}

impl Seek for IndexInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            IndexInput::Mapped(i) => i.seek(pos),
            IndexInput::Buffered(i) => i.reader.seek(pos),
        }
    }
}

impl std::fmt::Debug for IndexInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexInput")
            .field("name", &self.name())
            .field("route", &self.route())
            .field("len", &self.len())
            .finish()
    }
}

/// mmap 读句柄；每次 open 各自映射，句柄存活期间登记在后端的映射表里。空文件没有映射。
pub struct MmapInput {
    name: String,
    map: Option<Mmap>,
    pos: u64,
    region: Option<(u64, Arc<OpenTable>)>,
}

impl MmapInput {
    pub(crate) fn open(table: &Arc<OpenTable>, name: &str, map: Option<Mmap>) -> Self {
        let region = map
            .as_ref()
            .map(|m| (table.register(name, m.len() as u64), Arc::clone(table)));
        Self {
            name: name.to_string(),
            map,
            pos: 0,
            region,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }
}

impl Drop for MmapInput {
    fn drop(&mut self) {
        if let Some((id, table)) = self.region.take() {
            table.release(id);
        }
    }
}

impl Read for MmapInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.as_slice();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MmapInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.len() as i128;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::End(d) => len + d as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek before start of {}", self.name),
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// 存活句柄登记表：id → (文件名, 字节数)。两个后端各持有一张。
#[derive(Default)]
pub(crate) struct OpenTable {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, (String, u64)>>,
}

impl OpenTable {
    fn register(&self, name: &str, len: u64) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.lock().insert(id, (name.to_string(), len));
        id
    }

    fn release(&self, id: u64) {
        self.open.lock().remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.open.lock().len()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.open.lock().values().map(|(_, len)| len).sum()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.open.lock().values().map(|(n, _)| n.clone()).collect();
        v.sort();
        v
    }

    /// 后端 close：清空登记，已打开句柄照常可读，drop 时的 release 变成空操作
    pub(crate) fn detach_all(&self) -> usize {
        let mut open = self.open.lock();
        let n = open.len();
        open.clear();
        n
    }
}

/// 缓冲读句柄
pub struct BufferedInput {
    name: String,
    len: u64,
    reader: BufReader<File>,
    id: u64,
    table: Arc<OpenTable>,
}

impl BufferedInput {
    pub(crate) fn open(table: &Arc<OpenTable>, name: &str, file: File, len: u64) -> Self {
        let id = table.register(name, len);
        Self {
            name: name.to_string(),
            len,
            reader: BufReader::with_capacity(BUFFER_SIZE, file),
            id,
            table: Arc::clone(table),
        }
    }
}

impl Drop for BufferedInput {
    fn drop(&mut self) {
        self.table.release(self.id);
    }
}

/// 新建文件的写句柄（段文件只写一次）
pub struct IndexOutput {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl IndexOutput {
    pub(crate) fn new(name: &str, path: PathBuf, file: File) -> Self {
        Self {
            name: name.to_string(),
            path,
            writer: BufWriter::with_capacity(BUFFER_SIZE, file),
            written: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// flush 并关闭；返回写入字节数。持久化由 `Directory::sync` 负责。
    pub fn finish(mut self) -> io::Result<u64> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

impl std::fmt::Debug for IndexOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexOutput")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("written", &self.written)
            .finish()
    }
}

impl Write for IndexOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
