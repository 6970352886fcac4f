use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::{Context, Result};

use traits::BlockSource;
use types::block::Block;

/// Reads one JSON encoded block per line. Blank lines are skipped.
pub(crate) struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl JsonLinesSource {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line: 0,
        })
    }
}

impl BlockSource for JsonLinesSource {
    fn next_block(&mut self) -> Result<Option<Block>> {
        for line in self.lines.by_ref() {
            self.line += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let block = serde_json::from_str(&line)
                .with_context(|| format!("malformed block on line {}", self.line))?;
            return Ok(Some(block));
        }
        Ok(None)
    }
}
