use bzip2::read::BzDecoder;
use contentstat_common::errors::*;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressedWith {
    // .gz
    Gzip,
    // .bz2
    Bzip2,
    // .xz
    Xz,
    // .zst
    Zstd,
    Unknown,
}

pub fn detect_compression(bytes: &[u8]) -> CompressedWith {
    let mime = tree_magic_mini::from_u8(bytes);
    debug!("Detected mimetype for possibly compressed data: {:?}", mime);

    match mime {
        "application/gzip" => CompressedWith::Gzip,
        "application/x-gzip" => CompressedWith::Gzip,
        "application/x-bzip" => CompressedWith::Bzip2,
        "application/x-bzip2" => CompressedWith::Bzip2,
        "application/x-xz" => CompressedWith::Xz,
        "application/zstd" => CompressedWith::Zstd,
        _ => CompressedWith::Unknown,
    }
}

pub fn detect_from_extension(path: &Path) -> CompressedWith {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => CompressedWith::Gzip,
        Some("bz2") => CompressedWith::Bzip2,
        Some("xz") => CompressedWith::Xz,
        Some("zst") | Some("zstd") => CompressedWith::Zstd,
        _ => CompressedWith::Unknown,
    }
}

pub fn stream<'a, R: BufRead + 'a>(comp: CompressedWith, reader: R) -> io::Result<Box<dyn Read + 'a>> {
    match comp {
        CompressedWith::Gzip => Ok(Box::new(MultiGzDecoder::new(reader))),
        CompressedWith::Bzip2 => Ok(Box::new(BzDecoder::new(reader))),
        CompressedWith::Xz => Ok(Box::new(XzDecoder::new(reader))),
        CompressedWith::Zstd => Ok(Box::new(zstd::Decoder::with_buffer(reader)?)),
        CompressedWith::Unknown => Ok(Box::new(reader)),
    }
}

/// Open a possibly compressed contents file for line by line reading.
///
/// Nothing but the first block of the file is read before the reader is
/// polled, the decompressed content is never held in memory as a whole.
pub fn open<P: AsRef<Path>>(path: P) -> Result<ContentsReader, DecodeFailure> {
    let path = path.as_ref();
    let fail = |source: io::Error| DecodeFailure {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(fail)?;
    let mut reader = BufReader::new(file);

    let comp = match detect_compression(reader.fill_buf().map_err(fail)?) {
        CompressedWith::Unknown => detect_from_extension(path),
        comp => comp,
    };
    debug!("Detected compression for {:?}: {:?}", path, comp);

    let inner = stream(comp, reader).map_err(fail)?;
    Ok(ContentsReader {
        path: path.to_path_buf(),
        reader: Some(BufReader::new(inner)),
        buf: Vec::new(),
    })
}

/// Decoded lines of one contents file, without line terminators.
///
/// The first decode error is yielded once and ends the iteration. The file
/// handle is closed as soon as the reader is exhausted or dropped.
pub struct ContentsReader {
    path: PathBuf,
    reader: Option<BufReader<Box<dyn Read>>>,
    buf: Vec<u8>,
}

impl Iterator for ContentsReader {
    type Item = Result<String, DecodeFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        self.buf.clear();
        match reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(source) => {
                self.reader = None;
                Some(Err(DecodeFailure {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

impl FusedIterator for ContentsReader {}
