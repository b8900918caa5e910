//! Ground-truth files.
//!
//! Two layouts are supported:
//!
//! * **text**: first line `<num_queries>\t<k>`, then one line per query:
//!   `<query_index>\t` followed by `<id>\t<distance>\t` for each neighbor in
//!   ascending distance order.
//! * **ivecs**: per query, a little-endian `i32` count followed by that many
//!   little-endian `i32` ids. Distances are not stored. The count is the
//!   number of ids the query holds: `k` whenever the dataset had at least `k`
//!   items, fewer otherwise.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashSet;
use log::info;

use crate::error::{RankError, Result};
use crate::ground_truth::GtQuery;
use crate::topk::DistancePair;

/// Finalized exact neighbors for a query batch that shares one `k`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Benchmark {
    pub(crate) k: usize,
    pub(crate) answers: Vec<Vec<DistancePair>>,
}

impl Benchmark {
    /// Snapshot a finished batch. Every query must hold the same `k`.
    pub fn from_queries(queries: &[GtQuery]) -> Result<Self> {
        let first = queries.first().ok_or(RankError::EmptyBatch)?;
        let k = first.k();
        let answers = queries
            .iter()
            .enumerate()
            .map(|(i, q)| {
                if q.k() != k {
                    return Err(RankError::KMismatch {
                        expected: k,
                        got: q.k(),
                        query: i,
                    });
                }
                Ok(q.top_k())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { k, answers })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Exact neighbors of query `i`, closest first.
    pub fn answer(&self, i: usize) -> Option<&[DistancePair]> {
        self.answers.get(i).map(Vec::as_slice)
    }

    /// Fraction of query `i`'s true neighbors present in `found`.
    pub fn recall(&self, i: usize, found: &[usize]) -> Option<f32> {
        let answer = self.answer(i)?;
        if answer.is_empty() {
            return Some(1.0);
        }
        let found: HashSet<usize> = found.iter().copied().collect();
        let hits = answer.iter().filter(|p| found.contains(&p.id)).count();
        Some(hits as f32 / answer.len() as f32)
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    pub fn write_text_to<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "{}\t{}", self.answers.len(), self.k)?;
        for (i, answer) in self.answers.iter().enumerate() {
            write!(w, "{i}\t")?;
            for pair in answer {
                write!(w, "{}\t{}\t", pair.id, pair.distance)?;
            }
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_text_to(BufWriter::new(file))?;
        info!("text ground truth written to {}", path.display());
        Ok(())
    }

    pub fn read_text_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines.next().ok_or_else(|| RankError::Parse {
            line: 1,
            reason: "missing header".into(),
        })??;
        let mut fields = header.split('\t').filter(|s| !s.is_empty());
        let num_queries: usize = parse_field(fields.next(), 1, "query count")?;
        let k: usize = parse_field(fields.next(), 1, "k")?;

        let mut answers = Vec::with_capacity(num_queries);
        for (offset, line) in lines.enumerate() {
            let line_no = offset + 2;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t').filter(|s| !s.is_empty());
            let index: usize = parse_field(fields.next(), line_no, "query index")?;
            if index != answers.len() {
                return Err(RankError::Parse {
                    line: line_no,
                    reason: format!("expected query {}, found {index}", answers.len()),
                });
            }
            let mut answer = Vec::with_capacity(k);
            while let Some(id) = fields.next() {
                let id: usize = parse_field(Some(id), line_no, "id")?;
                let distance: f32 = parse_field(fields.next(), line_no, "distance")?;
                answer.push(DistancePair::new(id, distance));
            }
            answers.push(answer);
        }

        if answers.len() != num_queries {
            return Err(RankError::Parse {
                line: 1,
                reason: format!(
                    "header declares {num_queries} queries, found {}",
                    answers.len()
                ),
            });
        }
        Ok(Self { k, answers })
    }

    pub fn read_text(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_text_from(BufReader::new(file))
    }

    // ------------------------------------------------------------------
    // ivecs
    // ------------------------------------------------------------------

    /// Each record's count is the number of ids held, which equals `k`
    /// whenever the dataset had at least `k` items.
    pub fn write_ivecs_to<W: Write>(&self, mut w: W) -> Result<()> {
        for answer in &self.answers {
            w.write_i32::<LittleEndian>(to_i32(answer.len())?)?;
            for pair in answer {
                w.write_i32::<LittleEndian>(to_i32(pair.id)?)?;
            }
        }
        w.flush()?;
        Ok(())
    }

    pub fn write_ivecs(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_ivecs_to(BufWriter::new(file))?;
        info!("ivecs ground truth written to {}", path.display());
        Ok(())
    }

    /// Read id lists back from ivecs. Distances come back as NaN.
    pub fn read_ivecs_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut answers = Vec::new();
        let mut k = 0usize;
        loop {
            let count = match reader.read_i32::<LittleEndian>() {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let count = usize::try_from(count).map_err(|_| RankError::Parse {
                line: answers.len() + 1,
                reason: format!("negative record length {count}"),
            })?;
            k = k.max(count);
            let mut answer = Vec::with_capacity(count);
            for _ in 0..count {
                let id = reader.read_i32::<LittleEndian>()?;
                let id = usize::try_from(id).map_err(|_| RankError::Parse {
                    line: answers.len() + 1,
                    reason: format!("negative id {id}"),
                })?;
                answer.push(DistancePair::new(id, f32::NAN));
            }
            answers.push(answer);
        }
        Ok(Self { k, answers })
    }

    pub fn read_ivecs(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_ivecs_from(BufReader::new(file))
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, what: &str) -> Result<T> {
    let raw = field.ok_or_else(|| RankError::Parse {
        line,
        reason: format!("missing {what}"),
    })?;
    raw.trim().parse().map_err(|_| RankError::Parse {
        line,
        reason: format!("invalid {what}: {raw:?}"),
    })
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| RankError::IvecsOverflow(value))
}

/// Writes a finished [`GtQuery`] batch in either ground-truth layout.
pub struct GroundWriter;

impl GroundWriter {
    pub fn write_text(path: &Path, queries: &[GtQuery]) -> Result<()> {
        Benchmark::from_queries(queries)?.write_text(path)
    }

    pub fn write_ivecs(path: &Path, queries: &[GtQuery]) -> Result<()> {
        Benchmark::from_queries(queries)?.write_ivecs(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use ndarray::array;

    fn finished_batch() -> Vec<GtQuery> {
        let data = array![[0.0, 0.0], [3.0, 4.0], [1.0, 0.0]];
        let mut batch = vec![
            GtQuery::with_metric(array![0.0, 0.0], 2, DistanceMetric::Euclidean).unwrap(),
            GtQuery::with_metric(array![3.0, 4.0], 2, DistanceMetric::Euclidean).unwrap(),
        ];
        for q in batch.iter_mut() {
            for (id, row) in data.outer_iter().enumerate() {
                q.evaluate(&row, id).unwrap();
            }
        }
        batch
    }

    #[test]
    fn test_text_layout() {
        let bench = Benchmark::from_queries(&finished_batch()).unwrap();
        let mut buf = Vec::new();
        bench.write_text_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2\t2");
        assert_eq!(lines[1], "0\t0\t0\t2\t1\t");
        assert!(lines[2].starts_with("1\t1\t0\t"));
    }

    #[test]
    fn test_ivecs_layout() {
        let bench = Benchmark::from_queries(&finished_batch()).unwrap();
        let mut buf = Vec::new();
        bench.write_ivecs_to(&mut buf).unwrap();
        let expected: Vec<u8> = [2i32, 0, 2, 2, 1, 2]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_ivecs_count_is_held_ids_when_dataset_is_small() {
        let mut q = GtQuery::with_metric(array![0.0], 5, DistanceMetric::Euclidean).unwrap();
        q.evaluate(&array![2.0].view(), 0).unwrap();
        q.evaluate(&array![1.0].view(), 1).unwrap();
        let bench = Benchmark::from_queries(&[q]).unwrap();
        let mut buf = Vec::new();
        bench.write_ivecs_to(&mut buf).unwrap();
        let expected: Vec<u8> = [2i32, 1, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(buf, expected);

        let loaded = Benchmark::read_ivecs_from(buf.as_slice()).unwrap();
        assert_eq!(loaded.answer(0).map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_ivecs_field_overflow() {
        let too_big = i32::MAX as usize + 1;
        assert!(matches!(to_i32(too_big), Err(RankError::IvecsOverflow(v)) if v == too_big));
        assert_eq!(to_i32(7).unwrap(), 7);

        let bench = Benchmark {
            k: 1,
            answers: vec![vec![DistancePair::new(too_big, 0.0)]],
        };
        assert!(matches!(
            bench.write_ivecs_to(Vec::new()),
            Err(RankError::IvecsOverflow(_))
        ));
    }

    #[test]
    fn test_k_mismatch_rejected() {
        let batch = vec![
            GtQuery::with_metric(array![0.0], 2, DistanceMetric::Euclidean).unwrap(),
            GtQuery::with_metric(array![0.0], 3, DistanceMetric::Euclidean).unwrap(),
        ];
        assert!(matches!(
            Benchmark::from_queries(&batch),
            Err(RankError::KMismatch {
                expected: 2,
                got: 3,
                query: 1
            })
        ));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            Benchmark::from_queries(&[]),
            Err(RankError::EmptyBatch)
        ));
    }

    #[test]
    fn test_read_text_rejects_garbage() {
        let input = "1\t2\n0\t5\tnot-a-number\t\n";
        let err = Benchmark::read_text_from(input.as_bytes()).unwrap_err();
        assert!(matches!(err, RankError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_recall() {
        let bench = Benchmark::from_queries(&finished_batch()).unwrap();
        assert_eq!(bench.recall(0, &[0, 2]), Some(1.0));
        assert_eq!(bench.recall(0, &[2, 7]), Some(0.5));
        assert_eq!(bench.recall(5, &[0]), None);
    }
}
