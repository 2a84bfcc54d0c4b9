use camino::{Utf8Path, Utf8PathBuf};
use ip_extract::Ledger;
use ripline::{
    line_buffer::{LineBufferBuilder, LineBufferReader},
    lines::LineIter,
};
use std::io::{self, Read};
use tracing::{debug, warn};

use crate::error::Result;
use crate::input::{open_file, open_stdin};

/// Count every address in `reader`, line by line.
pub fn scan_reader<R: Read>(reader: R, ledger: &mut Ledger) -> io::Result<()> {
    let mut line_buffer = LineBufferBuilder::new().capacity(65536).build();
    let mut lb_reader = LineBufferReader::new(reader, &mut line_buffer);

    while lb_reader.fill()? {
        let buffer = lb_reader.buffer();
        for line in LineIter::new(b'\n', buffer) {
            ledger.record_bytes(line);
        }
        lb_reader.consume_all();
    }
    Ok(())
}

/// Scan one file, plain or gzip.
pub fn scan_file(path: &Utf8Path, exclude_bogons: bool) -> Result<Ledger> {
    let mut ledger = Ledger::new(exclude_bogons);
    scan_reader(open_file(path)?, &mut ledger)?;
    debug!(%path, distinct = ledger.len(), "scanned file");
    Ok(ledger)
}

/// Scan standard input.
pub fn scan_stdin(exclude_bogons: bool) -> Result<Ledger> {
    let mut ledger = Ledger::new(exclude_bogons);
    scan_reader(open_stdin()?, &mut ledger)?;
    Ok(ledger)
}

/// Scan every file below `root`, folding the per-file ledgers together.
///
/// Files and directories that cannot be read are logged and skipped.
/// Symbolic links are not followed.
pub fn scan_dir(root: &Utf8Path, exclude_bogons: bool) -> Result<Ledger> {
    let mut total = Ledger::new(exclude_bogons);
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut children = match list_dir(&dir) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %dir, error = %e, "skipping unreadable directory");
                continue;
            }
        };
        // Visit in name order; the stack reverses it.
        children.sort();
        for (path, is_dir) in children.into_iter().rev() {
            if is_dir {
                pending.push(path);
                continue;
            }
            match scan_file(&path, exclude_bogons) {
                Ok(ledger) => total.merge_from(&ledger),
                Err(e) => warn!(%path, error = %e, "skipping unreadable file"),
            }
        }
    }
    Ok(total)
}

fn list_dir(dir: &Utf8Path) -> io::Result<Vec<(Utf8PathBuf, bool)>> {
    let mut children = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let kind = entry.file_type()?;
        if kind.is_symlink() {
            debug!(path = %entry.path(), "not following symlink");
            continue;
        }
        children.push((entry.path().to_path_buf(), kind.is_dir()));
    }
    Ok(children)
}
