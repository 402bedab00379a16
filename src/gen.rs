//! Test data generator.

use std::collections::VecDeque;
use std::io;
use std::io::prelude::*;

use rand::Rng;

/// Alphabet of randomly generated lines.
pub const RANDOM_ALPHABET: &[u8] = b"0123456789_ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Alphabet of patterned lines, consumed from the end.
pub const PATTERN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Writes `count` random lines, each of a length uniformly chosen in `[0, max_len)`.
pub fn random_lines<R: Rng, W: Write>(count: usize, max_len: usize, rng: &mut R, output: W) -> io::Result<()> {
    if max_len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "maximum line length must be positive",
        ));
    }

    let mut output = io::BufWriter::new(output);
    let mut line = Vec::with_capacity(max_len);
    for _ in 0..count {
        line.clear();
        let len = rng.gen_range(0..max_len);
        line.extend((0..len).map(|_| RANDOM_ALPHABET[rng.gen_range(0..RANDOM_ALPHABET.len())]));
        line.push(b'\n');
        output.write_all(&line)?;
    }

    output.flush()
}

/// Writes `count` lines where every line is the previous one with the next letter of the
/// reversed alphabet prepended: `Z`, `YZ`, `XYZ`, ... The alphabet repeats after `A`.
pub fn reversed_alphabet_lines<W: Write>(count: usize, output: W) -> io::Result<()> {
    let mut output = io::BufWriter::new(output);
    let mut line = VecDeque::new();
    for i in 0..count {
        line.push_front(PATTERN_ALPHABET[PATTERN_ALPHABET.len() - 1 - i % PATTERN_ALPHABET.len()]);

        let (head, tail) = line.as_slices();
        output.write_all(head)?;
        output.write_all(tail)?;
        output.write_all(b"\n")?;
    }

    output.flush()
}
