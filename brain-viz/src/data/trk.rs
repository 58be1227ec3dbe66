//! TrackVis `.trk` 纤维束文件.
//!
//! 文件由 1000 字节的文件头和若干条纤维组成. 每条纤维为:
//!
//! 1. `i32` 节点数 `m`;
//! 2. `m` 个节点, 每个节点为 `3 + n_scalars` 个 `f32`;
//! 3. `n_properties` 个 `f32`.
//!
//! 读取器按条流式解码, 峰值内存只与最长纤维有关.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::elem::Endian;
use super::{open_source, SourceReader};
use crate::consts::{TRK_HEADER_SIZE, TRK_MAGIC};
use crate::{ExportError, ExportResult};

/// 一条纤维: 有序的三维点序列. 长度即节点数.
pub type Streamline = Vec<[f32; 3]>;

/// 纤维坐标所在空间.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrkSpace {
    /// RAS+ 毫米坐标. 与 nibabel 加载 trk 的默认行为一致.
    #[default]
    RasMm,

    /// TrackVis 原始 voxmm 坐标 (以体素角为原点).
    VoxMm,
}

/// trk 文件头中用到的字段.
#[derive(Debug, Clone, PartialEq)]
pub struct TrkHeader {
    /// 体数据维度.
    pub dim: [i16; 3],

    /// 体素大小 (毫米).
    pub voxel_size: [f32; 3],

    /// 每个节点附带的标量个数.
    pub n_scalars: i16,

    /// 每条纤维附带的属性个数.
    pub n_properties: i16,

    /// 体素到 RAS+ 毫米坐标的仿射矩阵. `[3][3] == 0` 表示未设置.
    pub vox_to_ras: [[f32; 4]; 4],

    /// 体素顺序, 如 `LPS`, `RAS`. 全为 0 时按 `LPS` 处理.
    pub voxel_order: [u8; 4],

    /// 纤维条数. 0 表示未知 (需要读到文件末尾).
    pub n_count: i32,

    /// 格式版本.
    pub version: i32,

    /// 文件字节序.
    pub endian: Endian,
}

impl TrkHeader {
    /// 解析 1000 字节的文件头. `path` 仅用于错误信息.
    pub fn parse(buf: &[u8], path: &Path) -> ExportResult<Self> {
        let malformed = |reason: &str| ExportError::MalformedTrk {
            path: path.to_owned(),
            reason: reason.to_string(),
        };

        if buf.len() < TRK_HEADER_SIZE {
            return Err(malformed("header shorter than 1000 bytes"));
        }
        if &buf[..TRK_MAGIC.len()] != TRK_MAGIC {
            return Err(malformed("missing `TRACK` magic"));
        }

        // hdr_size 位于 996, 恒为 1000. 用它来判断字节序.
        let size = TRK_HEADER_SIZE as i32;
        let header = if LittleEndian::read_i32(&buf[996..1000]) == size {
            Self::parse_with::<LittleEndian>(buf, Endian::Little)
        } else if BigEndian::read_i32(&buf[996..1000]) == size {
            Self::parse_with::<BigEndian>(buf, Endian::Big)
        } else {
            return Err(malformed("hdr_size is not 1000"));
        };
        if voxel_axes(&header.voxel_order).is_none() {
            return Err(malformed(&format!(
                "bad voxel_order {:?}",
                String::from_utf8_lossy(&header.voxel_order)
            )));
        }
        Ok(header)
    }

    fn parse_with<B: ByteOrder>(buf: &[u8], endian: Endian) -> Self {
        let f32_at = |off: usize| B::read_f32(&buf[off..off + 4]);
        let i16_at = |off: usize| B::read_i16(&buf[off..off + 2]);

        let mut vox_to_ras = [[0f32; 4]; 4];
        for (r, row) in vox_to_ras.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = f32_at(440 + 4 * (4 * r + c));
            }
        }
        let mut voxel_order = [0u8; 4];
        voxel_order.copy_from_slice(&buf[948..952]);

        Self {
            dim: [i16_at(6), i16_at(8), i16_at(10)],
            voxel_size: [f32_at(12), f32_at(16), f32_at(20)],
            n_scalars: i16_at(36),
            n_properties: i16_at(238),
            vox_to_ras,
            voxel_order,
            n_count: B::read_i32(&buf[988..992]),
            version: B::read_i32(&buf[992..996]),
            endian,
        }
    }

    /// 纤维条数. 文件头未记录时返回 `None`.
    #[inline]
    pub fn n_count(&self) -> Option<usize> {
        (self.n_count > 0).then_some(self.n_count as usize)
    }

    /// 以 `{d0}x{d1}x{d2}` 形式给出体数据维度, 用于输出文件名.
    pub fn dims_label(&self) -> String {
        let [a, b, c] = self.dim;
        format!("{a}x{b}x{c}")
    }

    /// 从 TrackVis voxmm 坐标到 RAS+ 毫米坐标的仿射矩阵, 与 nibabel 的计算一致:
    ///
    /// 1. 除以体素大小, 再平移半个体素 (体素角到体素中心);
    /// 2. 若 `voxel_order` 与 `vox_to_ras` 隐含的轴向不同, 则交换并翻转对应轴,
    ///    翻转轴上 `v` 变为 `dim - 1 - v`;
    /// 3. 乘 `vox_to_ras`. 未设置时以单位阵代替.
    pub fn voxmm_to_rasmm(&self) -> [[f64; 4]; 4] {
        let vs = self.voxel_size.map(|v| if v == 0.0 { 1.0 } else { v as f64 });

        let v2r: [[f64; 4]; 4] = if self.vox_to_ras[3][3] == 0.0 {
            identity()
        } else {
            self.vox_to_ras.map(|row| row.map(f64::from))
        };

        // (voxmm / vs - 0.5) 的仿射形式.
        let mut pre = identity();
        for i in 0..3 {
            pre[i][i] = 1.0 / vs[i];
            pre[i][3] = -0.5;
        }

        // 文件头体素顺序 -> vox_to_ras 的体素顺序.
        let from = voxel_axes(&self.voxel_order).unwrap_or(LPS);
        let to = affine_axes(&v2r);
        let mut reorient = [[0.0; 4]; 4];
        reorient[3][3] = 1.0;
        for (i, &(out, sign)) in from.iter().enumerate() {
            let j = to.iter().position(|&(o, _)| o == out).unwrap_or(i);
            let flip = if sign == to[j].1 { 1.0 } else { -1.0 };
            // 输出轴 i 取输入轴 j.
            reorient[i][j] = flip;
            if flip < 0.0 {
                reorient[i][3] = f64::from(self.dim[i]) - 1.0;
            }
        }

        matmul(&v2r, &matmul(&reorient, &pre))
    }
}

/// 每个体素轴对应的 RAS 轴与方向.
type Axes = [(usize, i8); 3];

const LPS: Axes = [(0, -1), (1, -1), (2, 1)];

/// 解析 `voxel_order`. 全为 0 时为 `LPS`; 非法或轴重复时返回 `None`.
fn voxel_axes(order: &[u8; 4]) -> Option<Axes> {
    let end = order.iter().position(|&b| b == 0).unwrap_or(order.len());
    if end == 0 {
        return Some(LPS);
    }
    if end != 3 {
        return None;
    }
    let mut axes = [(0usize, 0i8); 3];
    for (a, b) in axes.iter_mut().zip(&order[..3]) {
        *a = match b.to_ascii_uppercase() {
            b'L' => (0, -1),
            b'R' => (0, 1),
            b'P' => (1, -1),
            b'A' => (1, 1),
            b'I' => (2, -1),
            b'S' => (2, 1),
            _ => return None,
        };
    }
    let distinct = axes[0].0 != axes[1].0 && axes[0].0 != axes[2].0 && axes[1].0 != axes[2].0;
    distinct.then_some(axes)
}

/// 仿射矩阵隐含的体素轴向: 依次为每个体素轴选择绝对值最大且尚未占用的输出轴.
fn affine_axes(a: &[[f64; 4]; 4]) -> Axes {
    let mut axes = [(0usize, 1i8); 3];
    let mut used = [false; 3];
    for (col, axis) in axes.iter_mut().enumerate() {
        let row = (0..3)
            .filter(|&r| !used[r])
            .max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))
            .unwrap_or(col);
        used[row] = true;
        *axis = (row, if a[row][col] < 0.0 { -1 } else { 1 });
    }
    axes
}

fn identity() -> [[f64; 4]; 4] {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

fn matmul(a: &[[f64; 4]; 4], b: &[[f64; 4]; 4]) -> [[f64; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (0..4).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

/// 逐条读取 trk 纤维的流式读取器.
pub struct TrkReader<R = SourceReader> {
    path: PathBuf,
    reader: R,
    header: TrkHeader,
    affine: Option<[[f64; 4]; 4]>,
    read: usize,
    done: bool,
}

impl TrkReader<SourceReader> {
    /// 打开 trk (或 trk.gz) 文件并解析文件头.
    pub fn open<P: AsRef<Path>>(path: P, space: TrkSpace) -> ExportResult<Self> {
        let path = path.as_ref();
        let reader = open_source(path)?;
        let trk = Self::from_reader(reader, path, space)?;
        log::info!(
            "TRK - {} version {}, dim {}, {} streamline(s) declared",
            path.display(),
            trk.header.version,
            trk.header.dims_label(),
            trk.header.n_count
        );
        Ok(trk)
    }
}

impl<R: Read> TrkReader<R> {
    /// 从任意字节流创建读取器. `path` 仅用于错误信息.
    pub fn from_reader(mut reader: R, path: &Path, space: TrkSpace) -> ExportResult<Self> {
        let mut buf = vec![0u8; TRK_HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| ExportError::from_source_io(path, e))?;
        let header = TrkHeader::parse(&buf, path)?;
        let affine = match space {
            TrkSpace::RasMm => Some(header.voxmm_to_rasmm()),
            TrkSpace::VoxMm => None,
        };
        Ok(Self {
            path: path.to_owned(),
            reader,
            header,
            affine,
            read: 0,
            done: false,
        })
    }

    /// 文件头.
    #[inline]
    pub fn header(&self) -> &TrkHeader {
        &self.header
    }

    /// 已读取的纤维条数.
    #[inline]
    pub fn streamlines_read(&self) -> usize {
        self.read
    }

    fn unreadable(&self, e: io::Error) -> ExportError {
        ExportError::from_source_io(&self.path, e)
    }

    /// 读取下一条纤维. 到达末尾时返回 `Ok(None)`.
    fn read_one(&mut self) -> ExportResult<Option<Streamline>> {
        if self.header.n_count().is_some_and(|n| self.read >= n) {
            return Ok(None);
        }

        let mut nb = [0u8; 4];
        if !read_exact_or_eof(&mut self.reader, &mut nb).map_err(|e| self.unreadable(e))? {
            return match self.header.n_count() {
                // 文件头声明的条数比实际多.
                Some(n) => Err(ExportError::MalformedTrk {
                    path: self.path.clone(),
                    reason: format!("expected {n} streamlines, found {}", self.read),
                }),
                None => Ok(None),
            };
        }

        let endian = self.header.endian;
        let read_i32 = match endian {
            Endian::Little => LittleEndian::read_i32,
            Endian::Big => BigEndian::read_i32,
        };
        let read_f32 = match endian {
            Endian::Little => LittleEndian::read_f32,
            Endian::Big => BigEndian::read_f32,
        };

        let m = read_i32(&nb);
        if m < 0 {
            return Err(ExportError::MalformedTrk {
                path: self.path.clone(),
                reason: format!("negative point count {m} in streamline {}", self.read),
            });
        }
        let m = m as usize;
        let per_point = 3 + self.header.n_scalars.max(0) as usize;
        let props = self.header.n_properties.max(0) as usize;

        let len = m
            .checked_mul(per_point)
            .and_then(|n| n.checked_add(props))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| ExportError::MalformedTrk {
                path: self.path.clone(),
                reason: format!("point count {m} in streamline {} is too large", self.read),
            })?;

        // 按实际读到的字节增长缓冲区, 不预先分配文件声明的大小.
        let mut body = Vec::new();
        let got = (&mut self.reader).take(len as u64).read_to_end(&mut body);
        got.map_err(|e| self.unreadable(e))?;
        if body.len() < len {
            return Err(self.unreadable(io::ErrorKind::UnexpectedEof.into()));
        }

        let mut line = Streamline::with_capacity(m);
        for node in body.chunks_exact(4 * per_point).take(m) {
            let p = [read_f32(&node[0..4]), read_f32(&node[4..8]), read_f32(&node[8..12])];
            line.push(match &self.affine {
                Some(a) => apply(a, p),
                None => p,
            });
        }

        self.read += 1;
        Ok(Some(line))
    }
}

impl<R: Read> Iterator for TrkReader<R> {
    type Item = ExportResult<Streamline>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let r = self.read_one().transpose();
        if !matches!(r, Some(Ok(_))) {
            self.done = true;
        }
        r
    }
}

/// 读满 `buf`. 若一个字节都没读到就遇到文件末尾, 返回 `Ok(false)`.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[inline]
fn apply(a: &[[f64; 4]; 4], [x, y, z]: [f32; 3]) -> [f32; 3] {
    let (x, y, z) = (x as f64, y as f64, z as f64);
    let row = |r: usize| (a[r][0] * x + a[r][1] * y + a[r][2] * z + a[r][3]) as f32;
    [row(0), row(1), row(2)]
}

/// 全部载入内存的纤维集合, 可按位置索引.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tractogram {
    streamlines: Vec<Streamline>,
}

impl Tractogram {
    /// 由纤维列表创建.
    #[inline]
    pub fn new(streamlines: Vec<Streamline>) -> Self {
        Self { streamlines }
    }

    /// 一次性载入 trk 文件中的全部纤维.
    pub fn load<P: AsRef<Path>>(path: P, space: TrkSpace) -> ExportResult<Self> {
        let streamlines = TrkReader::open(path, space)?.collect::<ExportResult<_>>()?;
        Ok(Self { streamlines })
    }

    /// 纤维条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    /// 是否没有纤维.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// 所有纤维的节点总数.
    pub fn total_rows(&self) -> usize {
        self.streamlines.iter().map(Vec::len).sum()
    }

    /// 获取第 `index` 条纤维.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Streamline> {
        self.streamlines.get(index)
    }
}

impl IntoIterator for Tractogram {
    type Item = ExportResult<Streamline>;
    type IntoIter = std::iter::Map<std::vec::IntoIter<Streamline>, fn(Streamline) -> Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.streamlines
            .into_iter()
            .map(Ok as fn(Streamline) -> Self::Item)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// 构造一个小端 trk 文件的字节内容. `n_scalars` 个标量全部写 0.
    pub(crate) fn trk_bytes(lines: &[Streamline], n_scalars: i16, n_count: i32) -> Vec<u8> {
        let mut buf = vec![0u8; TRK_HEADER_SIZE];
        buf[..6].copy_from_slice(b"TRACK\0");
        LittleEndian::write_i16(&mut buf[6..8], 522);
        LittleEndian::write_i16(&mut buf[8..10], 448);
        LittleEndian::write_i16(&mut buf[10..12], 400);
        for off in [12, 16, 20] {
            LittleEndian::write_f32(&mut buf[off..off + 4], 1.0);
        }
        LittleEndian::write_i16(&mut buf[36..38], n_scalars);
        LittleEndian::write_i32(&mut buf[988..992], n_count);
        LittleEndian::write_i32(&mut buf[992..996], 2);
        LittleEndian::write_i32(&mut buf[996..1000], 1000);

        for line in lines {
            buf.write_i32::<LittleEndian>(line.len() as i32).unwrap();
            for p in line {
                for v in p {
                    buf.write_f32::<LittleEndian>(*v).unwrap();
                }
                for _ in 0..n_scalars {
                    buf.write_f32::<LittleEndian>(0.0).unwrap();
                }
            }
        }
        buf
    }

    fn reader(bytes: Vec<u8>, space: TrkSpace) -> TrkReader<io::Cursor<Vec<u8>>> {
        TrkReader::from_reader(io::Cursor::new(bytes), Path::new("mem.trk"), space).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let r = reader(trk_bytes(&[], 0, 0), TrkSpace::VoxMm);
        let h = r.header();
        assert_eq!(h.dim, [522, 448, 400]);
        assert_eq!(h.dims_label(), "522x448x400");
        assert_eq!(h.endian, Endian::Little);
        assert_eq!(h.version, 2);
        assert_eq!(h.n_count(), None);
    }

    #[test]
    fn test_stream_until_eof() {
        let lines = vec![
            vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            vec![[7.0, 8.0, 9.0]],
        ];
        let got: Vec<_> = reader(trk_bytes(&lines, 2, 0), TrkSpace::VoxMm)
            .collect::<ExportResult<_>>()
            .unwrap();
        assert_eq!(got, lines);
    }

    #[test]
    fn test_n_count_limits_and_checks() {
        let lines = vec![vec![[1.0, 1.0, 1.0]], vec![[2.0, 2.0, 2.0]]];

        let got: Vec<_> = reader(trk_bytes(&lines, 0, 1), TrkSpace::VoxMm)
            .collect::<ExportResult<_>>()
            .unwrap();
        assert_eq!(got.len(), 1);

        let r: ExportResult<Vec<_>> = reader(trk_bytes(&lines, 0, 3), TrkSpace::VoxMm).collect();
        assert!(matches!(r, Err(ExportError::MalformedTrk { .. })));
    }

    #[test]
    fn test_truncated_body() {
        let mut bytes = trk_bytes(&[vec![[1.0, 2.0, 3.0]]], 0, 0);
        bytes.truncate(bytes.len() - 2);
        let r: ExportResult<Vec<_>> = reader(bytes, TrkSpace::VoxMm).collect();
        assert!(matches!(r, Err(ExportError::Unreadable { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = trk_bytes(&[], 0, 0);
        bytes[0] = b'X';
        let r = TrkReader::from_reader(io::Cursor::new(bytes), Path::new("x.trk"), TrkSpace::RasMm);
        assert!(matches!(r, Err(ExportError::MalformedTrk { .. })));
    }

    /// 改写 `trk_bytes` 生成的文件头中的体素顺序, 体素大小与 `vox_to_ras`.
    fn with_orientation(
        mut bytes: Vec<u8>,
        order: &[u8],
        vs: f32,
        v2r: Option<[f32; 4]>,
    ) -> Vec<u8> {
        bytes[948..952].fill(0);
        bytes[948..948 + order.len()].copy_from_slice(order);
        for off in [12, 16, 20] {
            LittleEndian::write_f32(&mut bytes[off..off + 4], vs);
        }
        if let Some(diag) = v2r {
            for (i, d) in diag.into_iter().enumerate() {
                let off = 440 + 4 * (4 * i + i);
                LittleEndian::write_f32(&mut bytes[off..off + 4], d);
            }
        }
        bytes
    }

    fn rasmm(bytes: Vec<u8>) -> Vec<Streamline> {
        reader(bytes, TrkSpace::RasMm)
            .collect::<ExportResult<_>>()
            .unwrap()
    }

    #[test]
    fn test_rasmm_default_order_is_lps() {
        // vox_to_ras 未设置时为单位阵, 体素顺序按 LPS 处理: x, y 轴翻转.
        let lines = vec![vec![[1.5, 2.5, 3.5]]];
        assert_eq!(
            rasmm(trk_bytes(&lines, 0, 0)),
            vec![vec![[520.0, 445.0, 3.0]]]
        );
    }

    #[test]
    fn test_rasmm_matching_order_shifts_half_voxel() {
        let lines = vec![vec![[1.5, 2.5, 3.5]]];
        let bytes = with_orientation(trk_bytes(&lines, 0, 0), b"RAS", 1.0, None);
        assert_eq!(rasmm(bytes), vec![vec![[1.0, 2.0, 3.0]]]);

        let bytes = with_orientation(trk_bytes(&lines, 0, 0), b"ras", 1.0, None);
        assert_eq!(rasmm(bytes), vec![vec![[1.0, 2.0, 3.0]]]);
    }

    #[test]
    fn test_rasmm_with_vox_to_ras() {
        let lines = vec![vec![[3.0, 5.0, 7.0]]];
        let v2r = Some([2.0, 2.0, 2.0, 1.0]);

        let bytes = with_orientation(trk_bytes(&lines, 0, 0), b"RAS", 2.0, v2r);
        assert_eq!(rasmm(bytes), vec![vec![[2.0, 4.0, 6.0]]]);

        // 只有 x 轴与 vox_to_ras 方向相反: x = 522 - 1 - 1.
        let bytes = with_orientation(trk_bytes(&lines, 0, 0), b"LAS", 2.0, v2r);
        assert_eq!(rasmm(bytes), vec![vec![[1040.0, 4.0, 6.0]]]);
    }

    #[test]
    fn test_bad_voxel_order() {
        for order in [&b"XYZ"[..], b"LRS", b"LP"] {
            let bytes = with_orientation(trk_bytes(&[], 0, 0), order, 1.0, None);
            let r = TrkReader::from_reader(io::Cursor::new(bytes), Path::new("x.trk"), TrkSpace::RasMm);
            assert!(matches!(r, Err(ExportError::MalformedTrk { .. })));
        }
    }

    #[test]
    fn test_huge_point_count_is_not_preallocated() {
        let mut bytes = trk_bytes(&[], 0, 0);
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 24]);
        let r: ExportResult<Vec<_>> = reader(bytes, TrkSpace::VoxMm).collect();
        assert!(matches!(r, Err(ExportError::Unreadable { .. })));
    }

    #[test]
    fn test_tractogram_iter() {
        let t = Tractogram::new(vec![vec![[0.0; 3]; 5], vec![[0.0; 3]; 2]]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.total_rows(), 7);
        assert_eq!(t.get(1).map(Vec::len), Some(2));
        assert_eq!(t.into_iter().filter(Result::is_ok).count(), 2);
    }
}
