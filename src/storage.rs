//! Binary I/O for solved games.
//!
//! Format: 16-byte header, then `strategy[i32; n]` (little-endian, aligned
//! at offset 16), then `winner[u8; n]`. Loading uses zero-copy memory
//! mapping via `memmap2` and validates magic, version and size before
//! touching the body.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use memmap2::Mmap;

use crate::types::{Game, Vertex};

/// Solution file magic number: "PGSL" in hex.
const SOLUTION_MAGIC: u32 = 0x4C534750;
/// Solution file version.
const SOLUTION_VERSION: u32 = 1;

/// Binary file header: magic + version + vertex count.
#[repr(C)]
struct SolutionFileHeader {
    magic: u32,
    version: u32,
    num_vertices: u32,
    reserved: u32,
}

/// Check if a file exists on disk.
pub fn file_exists(filename: &str) -> bool {
    Path::new(filename).exists()
}

/// Save the winners and strategies of a fully solved game.
pub fn save_solution(game: &Game, filename: &str) {
    let start_time = Instant::now();
    let n = game.num_vertices();

    if !game.game_solved() {
        eprintln!(
            "Refusing to save a partial solution ({} vertices unsolved)",
            game.count_unsolved()
        );
        return;
    }

    if let Some(parent) = Path::new(filename).parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut f = match File::create(filename) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error creating file: {}", e);
            return;
        }
    };

    let header = SolutionFileHeader {
        magic: SOLUTION_MAGIC,
        version: SOLUTION_VERSION,
        num_vertices: n as u32,
        reserved: 0,
    };
    let header_bytes = unsafe {
        std::slice::from_raw_parts(
            &header as *const SolutionFileHeader as *const u8,
            std::mem::size_of::<SolutionFileHeader>(),
        )
    };
    f.write_all(header_bytes).unwrap();

    let strategies: Vec<i32> = (0..n as Vertex).map(|v| game.strategy(v)).collect();
    let strategy_bytes = unsafe {
        std::slice::from_raw_parts(
            strategies.as_ptr() as *const u8,
            n * std::mem::size_of::<i32>(),
        )
    };
    f.write_all(strategy_bytes).unwrap();

    let winners: Vec<u8> = (0..n as Vertex).map(|v| game.winner(v) as u8).collect();
    f.write_all(&winners).unwrap();

    let elapsed = start_time.elapsed().as_secs_f64() * 1000.0;
    println!("Saved solution for {} vertices in {:.2} ms", n, elapsed);
}

/// Load a solution into `game`, marking every vertex solved. Returns true
/// on success; size or header mismatches are reported and rejected.
pub fn load_solution(game: &mut Game, filename: &str) -> bool {
    let start_time = Instant::now();
    let n = game.num_vertices();

    let file = match File::open(filename) {
        Ok(f) => f,
        Err(_) => {
            println!("File not found: {}", filename);
            return false;
        }
    };

    let metadata = match file.metadata() {
        Ok(m) => m,
        Err(_) => return false,
    };

    let header_size = std::mem::size_of::<SolutionFileHeader>();
    let expected_size = header_size + n * std::mem::size_of::<i32>() + n;
    if metadata.len() as usize != expected_size {
        println!(
            "File size mismatch: expected {}, got {}",
            expected_size,
            metadata.len()
        );
        return false;
    }

    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(e) => {
            println!("Failed to memory map file: {}", e);
            return false;
        }
    };

    let header = unsafe { &*(mmap.as_ptr() as *const SolutionFileHeader) };
    if header.magic != SOLUTION_MAGIC || header.version != SOLUTION_VERSION {
        println!(
            "Invalid file format (magic=0x{:08x} version={})",
            header.magic, header.version
        );
        return false;
    }
    if header.num_vertices as usize != n {
        println!(
            "Vertex count mismatch: file has {}, game has {}",
            header.num_vertices, n
        );
        return false;
    }

    // strategies start at offset 16, which keeps the i32 reads aligned
    let strategies =
        unsafe { std::slice::from_raw_parts(mmap.as_ptr().add(header_size) as *const i32, n) };
    let winners = &mmap[header_size + n * std::mem::size_of::<i32>()..];

    for v in 0..n as Vertex {
        game.mark_solved(v, winners[v as usize] as i32, strategies[v as usize]);
    }

    let elapsed = start_time.elapsed().as_secs_f64() * 1000.0;
    println!("Loaded solution for {} vertices in {:.2} ms", n, elapsed);
    true
}
