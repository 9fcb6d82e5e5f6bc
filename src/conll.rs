//! Column-format sentence reading and writing
//!
//! Two layouts are accepted, one token per tab-separated row and sentences
//! separated by blank lines:
//!
//! - CoNLL-U, 10 columns: `id form lemma upos xpos feats head deprel deps misc`.
//!   Multiword ranges (`1-2`) and empty nodes (`2.1`) are skipped.
//! - Dependency format, 7 or 8 columns:
//!   `id form lemma pos feats head deprel [sheads]`, where `sheads` is
//!   `head:label;head:label` or `_`.
//!
//! A head of `_` or `-1` leaves the token unattached, so unparsed input can be
//! read with the same reader. Lines starting with `#` are skipped. Files
//! ending in `.gz` are decompressed on the fly.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Lines, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::heads::{HeadAssignment, NO_HEAD};
use crate::tree::{BLANK, DepArc, Features, NodeId, TreeStore};

/// Error reading column-format input
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("I/O error at line {line}: {source}")]
    Io { line: usize, source: io::Error },

    #[error("Line {line}: expected 7, 8 or 10 columns, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("Line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("Line {line}: expected token id {expected}, found {found}")]
    UnexpectedId {
        line: usize,
        expected: NodeId,
        found: NodeId,
    },

    #[error("Line {line}: head {head} is outside a sentence of {size} tokens")]
    HeadOutOfRange { line: usize, head: NodeId, size: usize },
}

/// Iterator over the sentences of a column-format source
pub struct ColumnReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
}

impl<R: BufRead> ColumnReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
        }
    }
}

impl ColumnReader<Cursor<String>> {
    /// Read from an in-memory string
    pub fn from_string(text: &str) -> Self {
        Self::new(Cursor::new(text.to_string()))
    }
}

impl ColumnReader<Box<dyn BufRead + Send>> {
    /// Read from a file, decompressing it if the name ends in `.gz`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let reader: Box<dyn BufRead + Send> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> Iterator for ColumnReader<R> {
    type Item = Result<TreeStore, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut rows = Vec::new();

        loop {
            self.line_num += 1;
            match self.lines.next() {
                None if rows.is_empty() => return None,
                None => break,
                Some(Err(source)) => {
                    return Some(Err(ReadError::Io {
                        line: self.line_num,
                        source,
                    }));
                }
                Some(Ok(line)) => {
                    let line = line.trim_end();
                    if line.is_empty() {
                        if rows.is_empty() {
                            continue;
                        }
                        break;
                    }
                    if line.starts_with('#') {
                        continue;
                    }
                    rows.push((self.line_num, line.to_string()));
                }
            }
        }

        Some(build_tree(&rows))
    }
}

/// One token row before heads are attached
struct Row<'a> {
    line: usize,
    form: &'a str,
    lemma: &'a str,
    pos: &'a str,
    feats: &'a str,
    head: &'a str,
    deprel: &'a str,
    secondary: Vec<(&'a str, &'a str)>,
}

fn build_tree(rows: &[(usize, String)]) -> Result<TreeStore, ReadError> {
    let mut tree = TreeStore::new();
    let mut parsed = Vec::with_capacity(rows.len());

    for (line, text) in rows {
        let Some(row) = parse_row(*line, text, tree.len())? else {
            continue;
        };
        tree.add_token(row.form, row.lemma, row.pos, Features::parse(row.feats));
        parsed.push(row);
    }

    let size = tree.len();
    let mut heads = HeadAssignment::new(size);
    for (idx, row) in parsed.iter().enumerate() {
        let id = idx + 1;
        if let Some(head) = parse_head(row.line, row.head, size)? {
            heads.set(id, head, row.deprel);
        }
        for &(head, label) in &row.secondary {
            match parse_number::<NodeId>(head).filter(|&h| h < size) {
                Some(head) => {
                    if let Some(node) = tree.get_mut(id) {
                        node.add_secondary_head(head, label);
                    }
                }
                None => log::warn!("line {}: skipping secondary head {:?}", row.line, head),
            }
        }
    }
    tree.reset_heads(&heads);
    Ok(tree)
}

/// Split a row into columns; `None` for CoNLL-U rows that are not plain tokens
fn parse_row(line: usize, text: &str, expected: NodeId) -> Result<Option<Row<'_>>, ReadError> {
    let fields: Vec<&str> = text.split('\t').collect();

    let row = match fields[..] {
        [id, form, lemma, upos, xpos, feats, head, deprel, deps, _misc] => {
            if id.contains(['-', '.']) {
                log::debug!("line {}: skipping non-word row {}", line, id);
                return Ok(None);
            }
            check_id(line, id, expected)?;
            Row {
                line,
                form,
                lemma: if lemma == BLANK { form } else { lemma },
                pos: if upos == BLANK { xpos } else { upos },
                feats,
                head,
                deprel,
                secondary: split_heads(deps, '|'),
            }
        }
        [id, form, lemma, pos, feats, head, deprel, ref rest @ ..] if rest.len() <= 1 => {
            check_id(line, id, expected)?;
            Row {
                line,
                form,
                lemma,
                pos,
                feats,
                head,
                deprel,
                secondary: rest.first().map(|&s| split_heads(s, ';')).unwrap_or_default(),
            }
        }
        _ => {
            return Err(ReadError::FieldCount {
                line,
                found: fields.len(),
            });
        }
    };
    Ok(Some(row))
}

fn check_id(line: usize, id: &str, expected: NodeId) -> Result<(), ReadError> {
    let found = parse_number::<NodeId>(id).ok_or_else(|| ReadError::InvalidNumber {
        line,
        field: "id",
        value: id.to_string(),
    })?;
    if found != expected {
        return Err(ReadError::UnexpectedId {
            line,
            expected,
            found,
        });
    }
    Ok(())
}

fn parse_head(line: usize, head: &str, size: usize) -> Result<Option<NodeId>, ReadError> {
    if head == BLANK || head == "-1" {
        return Ok(None);
    }
    let id = parse_number::<NodeId>(head).ok_or_else(|| ReadError::InvalidNumber {
        line,
        field: "head",
        value: head.to_string(),
    })?;
    if id >= size {
        return Err(ReadError::HeadOutOfRange {
            line,
            head: id,
            size: size - 1,
        });
    }
    Ok(Some(id))
}

/// `head:label` pairs separated by `sep`; `_` is empty
fn split_heads(field: &str, sep: char) -> Vec<(&str, &str)> {
    if field == BLANK {
        return Vec::new();
    }
    field
        .split(sep)
        .filter_map(|pair| pair.split_once(':'))
        .collect()
}

/// Whole-field unsigned number
fn parse_number<T: atoi::FromRadix10Checked>(field: &str) -> Option<T> {
    match T::from_radix_10_checked(field.as_bytes()) {
        (Some(n), used) if used == field.len() && used > 0 => Some(n),
        _ => None,
    }
}

/// Write one sentence in the 8-column dependency format, followed by a blank line
pub fn write_tree<W: Write>(writer: &mut W, tree: &TreeStore) -> io::Result<()> {
    for node in tree.tokens() {
        let (head, label) = match node.head_id() {
            Some(head) => (head.to_string(), node.label().unwrap_or(BLANK)),
            None => (NO_HEAD.to_string(), BLANK),
        };
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            node.id, node.form, node.lemma, node.pos, node.feats, head, label
        )?;
        write_secondary(writer, &node.secondary_heads)?;
        writeln!(writer)?;
    }
    writeln!(writer)
}

fn write_secondary<W: Write>(writer: &mut W, arcs: &[DepArc]) -> io::Result<()> {
    let mut written = 0;
    for arc in arcs {
        let Some(head) = arc.target else { continue };
        if written > 0 {
            write!(writer, ";")?;
        }
        write!(writer, "{}:{}", head, arc.label.as_deref().unwrap_or(BLANK))?;
        written += 1;
    }
    if written == 0 {
        write!(writer, "{}", BLANK)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONLLU: &str = "# text = The dog runs.
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNN\tNumber=Sing\t3\tnsubj\t3:nsubj\t_
3\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\tSpaceAfter=No
4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_

";

    #[test]
    fn test_read_conllu() {
        let mut reader = ColumnReader::from_string(CONLLU);
        let tree = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());

        assert_eq!(tree.len(), 5);
        assert_eq!(tree[1].form, "The");
        assert_eq!(tree[1].lemma, "the");
        assert_eq!(tree[2].pos, "NOUN");
        assert_eq!(tree[2].feat("Number"), Some("Sing"));
        assert_eq!(tree.head_id(2), Some(3));
        assert_eq!(tree[3].label(), Some("root"));
        assert_eq!(tree.dependents(3).len(), 2);
        assert_eq!(tree[2].secondary_heads, vec![DepArc::new(3, "nsubj")]);
    }

    #[test]
    fn test_skips_multiword_and_empty_nodes() {
        let text = "1-2\tdel\t_\t_\t_\t_\t_\t_\t_\t_
1\tde\tde\tADP\t_\t_\t2\tcase\t_\t_
2\tel\tel\tDET\t_\t_\t0\troot\t_\t_
2.1\tx\tx\tX\t_\t_\t_\t_\t2:dep\t_
";
        let tree = ColumnReader::from_string(text).next().unwrap().unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.to_raw_string(), "de el");
    }

    #[test]
    fn test_dependency_format_round_trip() {
        let text = "1\tJohn\tjohn\tNNP\t_\t2\tnsubj\t2:A0;3:A1
2\tsaw\tsee\tVBD\tTense=Past\t0\troot\t_
3\tMary\tmary\tNNP\t_\t-1\t_\t_

1\tHi\thi\tUH\t_\t0\troot

";
        let trees: Vec<TreeStore> = ColumnReader::from_string(text)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(trees.len(), 2);
        assert!(!trees[0][3].has_head());
        assert_eq!(trees[0][1].secondary_heads.len(), 2);

        let mut out = Vec::new();
        for tree in &trees {
            write_tree(&mut out, tree).unwrap();
        }
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written, text.replace("\troot\n", "\troot\t_\n"));
    }

    #[test]
    fn test_read_errors() {
        let bad_count = ColumnReader::from_string("1\tx\tx\n").next().unwrap();
        assert!(matches!(bad_count, Err(ReadError::FieldCount { line: 1, found: 3 })));

        let bad_id = ColumnReader::from_string("2\tx\tx\tX\t_\t0\troot\n").next().unwrap();
        assert!(matches!(
            bad_id,
            Err(ReadError::UnexpectedId {
                expected: 1,
                found: 2,
                ..
            })
        ));

        let bad_head = ColumnReader::from_string("1\tx\tx\tX\t_\t4\troot\n").next().unwrap();
        assert!(matches!(bad_head, Err(ReadError::HeadOutOfRange { head: 4, .. })));

        let not_number = ColumnReader::from_string("\n\n1\tx\tx\tX\t_\tx\troot\n").next().unwrap();
        assert!(matches!(
            not_number,
            Err(ReadError::InvalidNumber { line: 3, field: "head", .. })
        ));
    }

    #[test]
    fn test_read_gzip_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.conllu.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(CONLLU.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let trees: Vec<TreeStore> = ColumnReader::from_path(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].to_raw_string(), "The dog runs .");

        assert!(matches!(
            ColumnReader::from_path(dir.path().join("missing.conllu")),
            Err(ReadError::Open { .. })
        ));
    }
}
