use std::{
    fs,
    io::{self, BufRead, BufReader},
    mem,
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use log::warn;
use xz2::read::XzDecoder;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub op: Op,
    pub addr: u64,
}

/// Parses `<op> <hex-address>`. Lines whose operation is not `r` or `w`
/// yield `Ok(None)`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Access>> {
    let line = line.trim_start();
    let mut chars = line.chars();
    let op = match chars.next() {
        Some('r') => Op::Read,
        Some('w') => Op::Write,
        _ => return Ok(None),
    };
    let token = chars.as_str().split_whitespace().next().ok_or_else(|| Error::Trace {
        line: line_no,
        reason: "missing address".to_string(),
    })?;
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    // Trailing junk after the hex digits is ignored
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    let addr = u64::from_str_radix(&digits[..end], 16).map_err(|err| Error::Trace {
        line: line_no,
        reason: format!("bad address {:?}: {}", token, err),
    })?;
    Ok(Some(Access { op, addr }))
}

/// Batches arrive on `rec` in trace order, and accesses keep their order
/// within each batch.
pub struct Trace {
    pub rec: Receiver<io::Result<Vec<Access>>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    /// Reads from `path`, or standard input when there is none. Files ending
    /// in `.xz` are decompressed on the fly.
    pub fn read(
        path: Option<PathBuf>,
        access_per_block: usize,
        blocks_per_queue: usize,
    ) -> io::Result<Trace> {
        let stream: Box<dyn BufRead + Send> = match path {
            None => Box::new(BufReader::new(io::stdin())),
            Some(path) => {
                let file = fs::File::open(&path)?;
                if path.extension().is_some_and(|ext| ext == "xz") {
                    Box::new(BufReader::new(XzDecoder::new(file)))
                } else {
                    Box::new(BufReader::new(file))
                }
            }
        };
        Ok(Trace::from_reader(stream, access_per_block, blocks_per_queue))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(
        stream: R,
        access_per_block: usize,
        blocks_per_queue: usize,
    ) -> Trace {
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue);
        let access_per_block = access_per_block.max(1);

        let t = thread::spawn(move || Trace::run_thread(stream, access_per_block, sender));

        Trace {
            rec: receiver,
            _thread: t,
        }
    }

    fn run_thread<R: BufRead>(
        mut stream: R,
        access_per_block: usize,
        queue: Sender<io::Result<Vec<Access>>>,
    ) {
        let mut buffer = Vec::with_capacity(access_per_block);
        let mut raw = Vec::new();
        let mut line_no = 0;
        loop {
            raw.clear();
            match stream.read_until(b'\n', &mut raw) {
                Ok(0) => break,
                Ok(_) => line_no += 1,
                Err(err) => {
                    if !buffer.is_empty() {
                        let _ = queue.send(Ok(mem::take(&mut buffer)));
                    }
                    let _ = queue.send(Err(err));
                    return;
                }
            }
            // Lines are bytes, only r/w lines need to be text
            if !matches!(
                raw.iter().copied().find(|b| !b.is_ascii_whitespace()),
                Some(b'r' | b'w')
            ) {
                continue;
            }
            match parse_line(line_no, &String::from_utf8_lossy(&raw)) {
                Ok(Some(access)) => buffer.push(access),
                Ok(None) => {}
                Err(err) => warn!("skipping {}", err),
            }

            if buffer.len() == access_per_block {
                let full = mem::replace(&mut buffer, Vec::with_capacity(access_per_block));
                if queue.send(Ok(full)).is_err() {
                    return;
                }
            }
        }
        if !buffer.is_empty() {
            let _ = queue.send(Ok(buffer));
        }
    }
}
