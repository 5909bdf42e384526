//! Binary state file: network weights followed by the board.
//!
//! Layout, with no magic, version or length prefix:
//! 1. every layer's weights in construction order, big-endian `f32`,
//!    output-major, bias last;
//! 2. 16 signed bytes, one tile exponent per cell.
//!
//! The reader must already know the network topology.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::engine::Grid;
use crate::nn::Network;

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("state file not found: {0}")]
    NotFound(PathBuf),
    #[error("io error: {0}")]
    Io(io::Error),
    #[error("state stream ended early")]
    Truncated,
    #[error("malformed state: {0}")]
    Malformed(String),
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => PersistError::Truncated,
            _ => PersistError::Io(e),
        }
    }
}

/// Write the network segment then the grid segment.
pub fn write_state<W: Write + ?Sized>(w: &mut W, net: &Network, grid: &Grid) -> Result<(), PersistError> {
    net.write_to(w)?;
    grid.write_to(w)?;
    Ok(())
}

/// Read a full state into `net` and `grid`.
///
/// Both targets are read into scratch copies first; they are only replaced
/// once the whole stream parsed, so on error they keep their previous contents.
pub fn read_state<R: Read + ?Sized>(r: &mut R, net: &mut Network, grid: &mut Grid) -> Result<(), PersistError> {
    let mut staged_net = net.clone();
    let mut staged_grid = Grid::default();
    staged_net.read_from(r)?;
    staged_grid.read_from(r)?;
    *net = staged_net;
    *grid = staged_grid;
    Ok(())
}

pub fn save_to_path<P: AsRef<Path>>(path: P, net: &Network, grid: &Grid) -> Result<(), PersistError> {
    let mut w = BufWriter::new(fs::File::create(path)?);
    write_state(&mut w, net, grid)?;
    w.flush()?;
    Ok(())
}

pub fn load_from_path<P: AsRef<Path>>(path: P, net: &mut Network, grid: &mut Grid) -> Result<(), PersistError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PersistError::NotFound(path.to_path_buf()));
    }
    let mut r = BufReader::new(fs::File::open(path)?);
    read_state(&mut r, net, grid)
}
