use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use crate::error::{Error, Result};

/// Leading bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where addresses are read from.
///
/// A command line argument is stdin when it is `-`, a directory or file when
/// such a path exists, and literal text (for example `10.0.1.2,8.8.8.8`)
/// otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Dir(Utf8PathBuf),
    File(Utf8PathBuf),
    Text(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => write!(f, "<stdin>"),
            Source::Dir(path) | Source::File(path) => write!(f, "{}", path),
            Source::Text(_) => write!(f, "<text>"),
        }
    }
}

impl Source {
    /// Decide what kind of source `arg` names.
    pub fn classify(arg: &str) -> Result<Self> {
        if arg.trim().is_empty() {
            return Err(Error::InvalidInput {
                reason: "empty argument is neither a path nor an address list".to_string(),
            });
        }
        if arg == "-" {
            return Ok(Source::Stdin);
        }
        let path = Utf8Path::new(arg);
        if path.is_dir() {
            Ok(Source::Dir(path.to_path_buf()))
        } else if path.is_file() {
            Ok(Source::File(path.to_path_buf()))
        } else {
            Ok(Source::Text(arg.to_string()))
        }
    }
}

/// Open a file for scanning, transparently decompressing gzip content.
///
/// Compression is detected from the content, not the file name.
pub fn open_file(path: &Utf8Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    decompressing_reader(BufReader::new(file))
}

/// Stdin, with the same gzip detection as files.
pub fn open_stdin() -> Result<Box<dyn Read>> {
    decompressing_reader(BufReader::new(io::stdin()))
}

/// Wrap `reader` in a gzip decoder when its first bytes are the gzip magic.
pub fn decompressing_reader<R: BufRead + 'static>(mut reader: R) -> Result<Box<dyn Read>> {
    let head = reader.fill_buf()?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn classify_text_and_stdin() {
        assert_eq!(Source::classify("-").unwrap(), Source::Stdin);
        assert_eq!(
            Source::classify("10.0.1.2,8.8.8.8").unwrap(),
            Source::Text("10.0.1.2,8.8.8.8".into())
        );
        assert!(matches!(
            Source::classify("  "),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn gzip_detected_by_magic() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"seen 8.8.8.8\n").unwrap();
        let gz = enc.finish().unwrap();

        let mut out = String::new();
        decompressing_reader(Cursor::new(gz))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "seen 8.8.8.8\n");

        let mut plain = String::new();
        decompressing_reader(Cursor::new(b"plain 1.1.1.1".to_vec()))
            .unwrap()
            .read_to_string(&mut plain)
            .unwrap();
        assert_eq!(plain, "plain 1.1.1.1");
    }
}
