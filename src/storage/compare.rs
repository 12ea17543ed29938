use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Compare two byte streams for exact equality.
///
/// Both readers are buffered and consumed in lock-step, so neither side is
/// ever fully materialized. A stream ending before the other is a mismatch.
pub fn readers_equal<A: Read, B: Read>(a: A, b: B) -> io::Result<bool> {
    let mut a = BufReader::new(a);
    let mut b = BufReader::new(b);

    loop {
        let consumed = {
            let buf_a = a.fill_buf()?;
            let buf_b = b.fill_buf()?;

            match (buf_a.is_empty(), buf_b.is_empty()) {
                (true, true) => return Ok(true),
                (true, false) | (false, true) => return Ok(false),
                (false, false) => {}
            }

            let n = buf_a.len().min(buf_b.len());
            if buf_a[..n] != buf_b[..n] {
                return Ok(false);
            }
            n
        };

        a.consume(consumed);
        b.consume(consumed);
    }
}

/// Check whether the file at `path` holds exactly `payload`.
///
/// A missing file is treated as empty content, so it matches an empty
/// payload and nothing else.
pub fn file_matches(path: impl AsRef<Path>, payload: &[u8]) -> io::Result<bool> {
    match File::open(path.as_ref()) {
        Ok(file) => {
            // Cheap length check before streaming the contents.
            let len = file.metadata()?.len();
            if len != payload.len() as u64 {
                return Ok(false);
            }
            readers_equal(file, payload)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(payload.is_empty()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Reader that hands out at most `chunk` bytes per read call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }
    }

    #[test]
    fn test_equal_streams() {
        let a = b"groups:\n- name: g\n  rules: []\n";
        assert!(readers_equal(Cursor::new(a), Cursor::new(a)).unwrap());
    }

    #[test]
    fn test_both_empty() {
        assert!(readers_equal(io::empty(), io::empty()).unwrap());
    }

    #[test]
    fn test_mismatch() {
        assert!(!readers_equal(Cursor::new(b"abcd"), Cursor::new(b"abce")).unwrap());
    }

    #[test]
    fn test_prefix_is_not_equal() {
        assert!(!readers_equal(Cursor::new(b"abc"), Cursor::new(b"abcd")).unwrap());
        assert!(!readers_equal(Cursor::new(b"abcd"), Cursor::new(b"abc")).unwrap());
        assert!(!readers_equal(io::empty(), Cursor::new(b"a")).unwrap());
    }

    #[test]
    fn test_uneven_chunking() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

        let a = Trickle { data: &data, chunk: 7 };
        let b = Trickle { data: &data, chunk: 4093 };
        assert!(readers_equal(a, b).unwrap());

        let mut other = data.clone();
        other[19_999] ^= 0xff;
        let a = Trickle { data: &data, chunk: 13 };
        let b = Trickle { data: &other, chunk: 1 };
        assert!(!readers_equal(a, b).unwrap());
    }

    #[test]
    fn test_read_error_propagates() {
        let result = readers_equal(Failing, Cursor::new(b"x"));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_matches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");

        assert!(file_matches(&path, b"").unwrap());
        assert!(!file_matches(&path, b"groups: []\n").unwrap());

        std::fs::write(&path, b"groups: []\n").unwrap();
        assert!(file_matches(&path, b"groups: []\n").unwrap());
        assert!(!file_matches(&path, b"groups: [] \n").unwrap());
        assert!(!file_matches(&path, b"").unwrap());
    }
}
