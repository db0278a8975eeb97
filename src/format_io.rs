/// Reading and writing of path tables and audit logs
///
/// A path table has one fragment per line, ten tab-separated columns:
/// chain id, query name, query start, query end, subject name, subject start,
/// subject end, e-value, score, identity. Blank lines and lines starting with
/// `#` are skipped. Files ending in `.gz` are decompressed on the fly.
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::decision::{JoinDecision, SplitRecord};
use crate::error::{LongJoinError, Result};
use crate::ids::ChainId;
use crate::path::Fragment;
use crate::range::Range;

const PATH_COLUMNS: usize = 10;

/// Open a path table, decompressing gzip input by extension
pub fn open_path_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn parse_field<T: FromStr>(fields: &[&str], index: usize, name: &str, line: usize) -> Result<T> {
    fields[index].trim().parse::<T>().map_err(|_| {
        LongJoinError::input_format(line, format!("{} '{}' is not a number", name, fields[index]))
    })
}

/// Parse one path-table row; `line` is 1-based and only used in errors
pub fn parse_path_line(text: &str, line: usize) -> Result<Fragment> {
    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() < PATH_COLUMNS {
        return Err(LongJoinError::input_format(
            line,
            format!("expected {} columns, found {}", PATH_COLUMNS, fields.len()),
        ));
    }

    let chain_id = ChainId(parse_field(&fields, 0, "chain id", line)?);
    let query = Range::new(
        fields[1],
        parse_field(&fields, 2, "query start", line)?,
        parse_field(&fields, 3, "query end", line)?,
    );
    let subject = Range::new(
        fields[4],
        parse_field(&fields, 5, "subject start", line)?,
        parse_field(&fields, 6, "subject end", line)?,
    );
    let e_value: f64 = parse_field(&fields, 7, "e-value", line)?;
    let score: i64 = parse_field(&fields, 8, "score", line)?;
    let identity: f64 = parse_field(&fields, 9, "identity", line)?;

    if fields[1].is_empty() || fields[4].is_empty() {
        return Err(LongJoinError::input_format(line, "empty sequence name"));
    }
    if query.is_empty() || subject.is_empty() || query.min() == 0 || subject.min() == 0 {
        return Err(LongJoinError::input_format(
            line,
            "coordinates are 1-based; 0 marks an empty range",
        ));
    }
    if !(0.0..=100.0).contains(&identity) {
        return Err(LongJoinError::input_format(
            line,
            format!("identity {} is outside [0, 100]", identity),
        ));
    }

    let mut fragment = Fragment::new(chain_id, query, subject, e_value, score, identity);
    fragment.normalize();
    Ok(fragment)
}

/// Streaming reader over a path table
pub struct PathReader<R: Read> {
    reader: BufReader<R>,
    line: usize,
    buf: String,
}

impl<R: Read> PathReader<R> {
    pub fn new(reader: R) -> Self {
        PathReader {
            reader: BufReader::new(reader),
            line: 0,
            buf: String::new(),
        }
    }

    /// Next fragment, or `None` at end of input
    pub fn read_record(&mut self) -> Result<Option<Fragment>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() || text.starts_with('#') {
                continue;
            }
            return parse_path_line(text, self.line).map(Some);
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<Fragment>> {
        let mut fragments = Vec::new();
        while let Some(f) = self.read_record()? {
            fragments.push(f);
        }
        Ok(fragments)
    }
}

/// Read a whole path table from disk
pub fn read_paths<P: AsRef<Path>>(path: P) -> Result<Vec<Fragment>> {
    PathReader::new(open_path_input(path)?).read_all()
}

pub fn write_paths<W: Write>(writer: &mut W, fragments: &[Fragment]) -> Result<()> {
    for f in fragments {
        writeln!(writer, "{}", f)?;
    }
    Ok(())
}

/// Audit log: join decisions first, then one row per examined chain
pub fn write_decisions<W: Write>(
    writer: &mut W,
    decisions: &[JoinDecision],
    splits: &[SplitRecord],
) -> Result<()> {
    writeln!(
        writer,
        "#join\tquery\tsubject\tstrand\tprev_chain\tprev_start\tprev_end\tcur_chain\tcur_start\tcur_end\toutcome"
    )?;
    for d in decisions {
        writeln!(writer, "{}", d)?;
    }
    writeln!(
        writer,
        "#split\tquery\tchain\tresulting_chains\tdropped_fragments\tdropped_length\tevidence"
    )?;
    for s in splits {
        writeln!(writer, "{}", s)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_skips_comments_and_normalizes() {
        let data = "# header\n\n1\tchr1\t300\t100\tTE1\t10\t210\t1e-20\t150\t91.5\n";
        let fragments = PathReader::new(Cursor::new(data)).read_all().unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].query, Range::new("chr1", 100, 300));
        assert_eq!(fragments[0].subject, Range::new("TE1", 210, 10));
        assert_eq!(fragments[0].identity, 91.5);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let data = "1\tchr1\t1\t100\tTE1\t1\t100\t0\t10\t90\n2\tchr1\tx\t100\tTE1\t1\t100\t0\t10\t90\n";
        let err = PathReader::new(Cursor::new(data)).read_all().unwrap_err();
        assert!(matches!(err, LongJoinError::InputFormat { line: 2, .. }), "{err}");

        let err = parse_path_line("1\tchr1\t1\t100", 7).unwrap_err();
        assert!(err.to_string().contains("line 7"));

        assert!(parse_path_line("1\tchr1\t1\t100\tTE1\t1\t100\t0\t10\t101", 1).is_err());
        assert!(parse_path_line("1\tchr1\t0\t0\tTE1\t1\t100\t0\t10\t90", 1).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let fragment = Fragment::new(
            ChainId(12),
            Range::new("chr2", 5, 80),
            Range::new("TE7", 76, 1),
            2.5e-30,
            -3,
            77.25,
        );
        let mut out = Vec::new();
        write_paths(&mut out, std::slice::from_ref(&fragment)).unwrap();
        let back = PathReader::new(Cursor::new(out)).read_all().unwrap();
        assert_eq!(back, vec![fragment]);
    }
}
