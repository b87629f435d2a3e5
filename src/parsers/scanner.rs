//! # 行扫描器
//!
//! 把文本按行去除首尾空白后编号，提供两类操作：
//! - `find_lines`: 查找一组首尾锚定正则在连续行上同时匹配的起始行号
//! - `parse_matrix`: 从行区间中按列切片提取数值表，严格校验每行的 token 数
//!
//! 所有模式必须是 `^...$` 全行锚定，否则属于调用方缺陷，直接 panic。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs` 使用
//! - 使用 `regex` crate

use crate::error::{Result, ScanError};

use regex::Regex;
use std::path::Path;
use std::str::FromStr;

/// 多次匹配时取哪一个
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    First,
    Last,
}

/// 已去除首尾空白并编号的文本行
pub struct LineScanner {
    lines: Vec<String>,
}

impl LineScanner {
    pub fn new(text: &str) -> Self {
        LineScanner {
            lines: text.lines().map(|l| l.trim().to_string()).collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ScanError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::new(&text))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 第 `ix` 行，越界时为空串
    pub fn line(&self, ix: usize) -> &str {
        self.lines.get(ix).map(String::as_str).unwrap_or("")
    }

    // ─────────────────────────────────────────────────────────────
    // 模式查找
    // ─────────────────────────────────────────────────────────────

    /// 返回所有满足 `patterns[i]` 匹配第 `offset + i` 行的 `offset`
    ///
    /// 匹配数少于 `min_count`，或 `max_count > 0` 时多于 `max_count`，
    /// 返回 `CountOutOfRange`。
    pub fn find_lines(
        &self,
        patterns: &[&str],
        min_count: usize,
        max_count: usize,
    ) -> Result<Vec<usize>> {
        let regexes = compile_anchored(patterns)?;
        let span = regexes.len();

        let found: Vec<usize> = if span > self.lines.len() {
            Vec::new()
        } else {
            (0..=self.lines.len() - span)
                .filter(|&start| {
                    regexes
                        .iter()
                        .enumerate()
                        .all(|(i, re)| re.is_match(&self.lines[start + i]))
                })
                .collect()
        };

        if found.len() < min_count || (max_count > 0 && found.len() > max_count) {
            return Err(ScanError::CountOutOfRange {
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                min: min_count,
                max: max_count,
                found: found.len(),
            });
        }
        Ok(found)
    }

    /// 查找单个模式并按 `which` 取一行，至少需要一个匹配
    pub fn locate(&self, pattern: &str, which: Which, max_count: usize) -> Result<usize> {
        let ixs = self.find_lines(&[pattern], 1, max_count)?;
        let ix = match which {
            Which::First => ixs.first(),
            Which::Last => ixs.last(),
        };
        // find_lines 已保证非空
        Ok(*ix.unwrap_or(&0))
    }

    /// 第 `ix` 行是否匹配 `pattern`
    pub fn is_match(&self, ix: usize, pattern: &str) -> Result<bool> {
        let re = compile_anchored(&[pattern])?.remove(0);
        Ok(re.is_match(self.line(ix)))
    }

    /// 返回第 `ix` 行在 `pattern` 下的捕获组（组 1 起）
    pub fn capture(&self, ix: usize, pattern: &str) -> Result<Vec<String>> {
        let re = compile_anchored(&[pattern])?.remove(0);
        let line = self.line(ix);
        let caps = re.captures(line).ok_or_else(|| ScanError::MalformedTable {
            line: ix,
            text: line.to_string(),
            reason: format!("line does not match {}", pattern),
        })?;
        Ok(caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect())
    }

    /// 在第 `ix` 行上取捕获组 `group` 并解析为 `T`
    pub fn capture_parse<T: FromStr>(&self, ix: usize, pattern: &str, group: usize) -> Result<T> {
        let caps = self.capture(ix, pattern)?;
        let raw = match group.checked_sub(1).and_then(|g| caps.get(g)) {
            Some(raw) => raw,
            None => {
                return Err(ScanError::MalformedTable {
                    line: ix,
                    text: self.line(ix).to_string(),
                    reason: format!("pattern {} has no capture group {}", pattern, group),
                })
            }
        };
        raw.trim().parse::<T>().map_err(|_| ScanError::MalformedTable {
            line: ix,
            text: self.line(ix).to_string(),
            reason: format!("cannot parse group {} value {:?}", group, raw),
        })
    }

    /// 单行标量：查找、按 `which` 取行、解析捕获组 1
    ///
    /// `min_count == 0` 且没有匹配时返回 `None`。
    pub fn scalar<T: FromStr>(
        &self,
        pattern: &str,
        which: Which,
        min_count: usize,
        max_count: usize,
    ) -> Result<Option<T>> {
        let ixs = self.find_lines(&[pattern], min_count, max_count)?;
        let ix = match which {
            Which::First => ixs.first(),
            Which::Last => ixs.last(),
        };
        match ix {
            Some(&ix) => Ok(Some(self.capture_parse(ix, pattern, 1)?)),
            None => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 数值表提取
    // ─────────────────────────────────────────────────────────────

    /// 提取 `[row_beg, row_end)` 行、`[col_beg, col_end)` 列的数值表
    ///
    /// 区间内每行必须恰好有 `ntok` 个 token；第 `row_end` 行不能有 `ntok` 个
    /// token（该行不存在也视为合法边界）。
    pub fn parse_matrix(
        &self,
        ntok: usize,
        row_beg: usize,
        row_end: usize,
        col_beg: usize,
        col_end: usize,
    ) -> Result<Vec<Vec<f64>>> {
        if col_beg > col_end || col_end > ntok {
            return Err(ScanError::MalformedTable {
                line: row_beg,
                text: String::new(),
                reason: format!("bad column range {}..{} for {} tokens", col_beg, col_end, ntok),
            });
        }

        let mut rows = Vec::with_capacity(row_end.saturating_sub(row_beg));
        for ix in row_beg..row_end {
            let line = self.lines.get(ix).ok_or_else(|| ScanError::MalformedTable {
                line: ix,
                text: String::new(),
                reason: "table runs past end of file".to_string(),
            })?;
            let toks: Vec<&str> = line.split_whitespace().collect();
            if toks.len() != ntok {
                return Err(ScanError::MalformedTable {
                    line: ix,
                    text: line.clone(),
                    reason: format!("expected {} tokens, found {}", ntok, toks.len()),
                });
            }

            let row = toks[col_beg..col_end]
                .iter()
                .map(|t| {
                    t.parse::<f64>().map_err(|_| ScanError::MalformedTable {
                        line: ix,
                        text: line.clone(),
                        reason: format!("invalid number {:?}", t),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        if let Some(boundary) = self.lines.get(row_end) {
            if boundary.split_whitespace().count() == ntok {
                return Err(ScanError::MalformedTable {
                    line: row_end,
                    text: boundary.clone(),
                    reason: format!("table continues past expected end ({} tokens)", ntok),
                });
            }
        }

        Ok(rows)
    }

    /// `parse_matrix` 的三列版本
    pub fn parse_rows3(
        &self,
        ntok: usize,
        row_beg: usize,
        row_end: usize,
        col_beg: usize,
    ) -> Result<Vec<[f64; 3]>> {
        let rows = self.parse_matrix(ntok, row_beg, row_end, col_beg, col_beg + 3)?;
        Ok(rows.into_iter().map(|r| [r[0], r[1], r[2]]).collect())
    }

    /// `parse_matrix` 的 3×3 版本
    pub fn parse_mat3(&self, ntok: usize, row_beg: usize, col_beg: usize) -> Result<[[f64; 3]; 3]> {
        let rows = self.parse_rows3(ntok, row_beg, row_beg + 3, col_beg)?;
        Ok([rows[0], rows[1], rows[2]])
    }
}

/// 编译锚定模式；未锚定属于调用方缺陷
fn compile_anchored(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            assert!(
                p.starts_with('^') && p.ends_with('$'),
                "pattern must be anchored with ^...$: {}",
                p
            );
            Regex::new(p).map_err(|e| ScanError::parse(format!("pattern {}", p), e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "  header line  \n\
        direct lattice vectors                 reciprocal lattice vectors\n\
        4.000  0.000  0.000     0.250  0.000  0.000\n\
        0.000  4.000  0.000     0.000  0.250  0.000\n\
        0.000  0.000  4.000     0.000  0.000  0.250\n\
        \n\
        direct lattice vectors                 reciprocal lattice vectors\n\
        4.100  0.000  0.000     0.2439  0.000  0.000\n\
        0.000  4.100  0.000     0.000  0.2439  0.000\n\
        0.000  0.000  4.100     0.000  0.000  0.2439\n\
        volume of cell :       68.9210\n";

    const LATTICE: &str = r"^direct lattice vectors +reciprocal lattice vectors$";

    #[test]
    fn test_lines_are_stripped() {
        let sc = LineScanner::new(SAMPLE);
        assert_eq!(sc.line(0), "header line");
        assert_eq!(sc.line(999), "");
    }

    #[test]
    fn test_find_lines_counts() {
        let sc = LineScanner::new(SAMPLE);
        assert_eq!(sc.find_lines(&[LATTICE], 2, 0).unwrap(), vec![1, 6]);

        let err = sc.find_lines(&[LATTICE], 1, 1).unwrap_err();
        assert!(matches!(err, ScanError::CountOutOfRange { found: 2, .. }));

        let err = sc.find_lines(&[r"^missing$"], 1, 0).unwrap_err();
        assert!(matches!(err, ScanError::CountOutOfRange { found: 0, .. }));
    }

    #[test]
    fn test_find_lines_multi_pattern() {
        let sc = LineScanner::new(SAMPLE);
        let ixs = sc.find_lines(&[r"^$", LATTICE], 1, 0).unwrap();
        assert_eq!(ixs, vec![5]);
    }

    #[test]
    #[should_panic(expected = "anchored")]
    fn test_unanchored_pattern_panics() {
        let sc = LineScanner::new(SAMPLE);
        let _ = sc.find_lines(&["lattice"], 0, 0);
    }

    #[test]
    fn test_parse_matrix_columns() {
        let sc = LineScanner::new(SAMPLE);
        let recip = sc.parse_matrix(6, 2, 5, 3, 6).unwrap();
        assert_eq!(recip.len(), 3);
        assert_eq!(recip[1], vec![0.0, 0.25, 0.0]);

        let basis = sc.parse_mat3(6, 7, 0).unwrap();
        assert_eq!(basis[2][2], 4.1);
    }

    #[test]
    fn test_parse_matrix_boundary_violation() {
        let sc = LineScanner::new(SAMPLE);
        // 第 4 行仍有 6 个 token，不是合法边界
        let err = sc.parse_matrix(6, 2, 4, 0, 3).unwrap_err();
        assert!(matches!(err, ScanError::MalformedTable { line: 4, .. }));
    }

    #[test]
    fn test_parse_matrix_token_count() {
        let sc = LineScanner::new(SAMPLE);
        let err = sc.parse_matrix(6, 1, 3, 0, 3).unwrap_err();
        assert!(matches!(err, ScanError::MalformedTable { line: 1, .. }));
    }

    #[test]
    fn test_parse_matrix_missing_sentinel_is_ok() {
        let sc = LineScanner::new("1 2 3\n4 5 6");
        let m = sc.parse_matrix(3, 0, 2, 0, 3).unwrap();
        assert_eq!(m, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_parse_matrix_overflow_stars() {
        let sc = LineScanner::new("1.0 ******** 3.0\n");
        assert!(sc.parse_matrix(3, 0, 1, 0, 3).is_err());
    }

    #[test]
    fn test_parse_matrix_round_trip() {
        let matrices: Vec<Vec<Vec<f64>>> = vec![
            vec![vec![1.5, -2.25, 3.125e-5]],
            vec![
                vec![0.0, 1.0e10, -7.5, 42.0],
                vec![-0.001, 2.5, 3.75, -1.0e-12],
                vec![123456.789, -0.5, 0.25, 9.0],
            ],
        ];
        for m in matrices {
            let ncol = m[0].len();
            let mut text = String::from("begin\n");
            for row in &m {
                let cells: Vec<String> = row.iter().map(|v| format!("{:e}", v)).collect();
                text.push_str(&format!("   {}\n", cells.join("    ")));
            }
            text.push_str("end\n");

            let sc = LineScanner::new(&text);
            let parsed = sc.parse_matrix(ncol, 1, 1 + m.len(), 0, ncol).unwrap();
            for (a, b) in parsed.iter().zip(m.iter()) {
                for (x, y) in a.iter().zip(b.iter()) {
                    assert!((x - y).abs() <= f64::EPSILON * y.abs());
                }
            }
        }
    }

    #[test]
    fn test_scalar_and_capture() {
        let sc = LineScanner::new(SAMPLE);
        let pat = r"^volume of cell *: +([-.E0-9]+)$";
        let vol: Option<f64> = sc.scalar(pat, Which::Last, 1, 0).unwrap();
        assert_eq!(vol, Some(68.921));

        let none: Option<f64> = sc.scalar(r"^ALGO *= *(\w+).*$", Which::First, 0, 1).unwrap();
        assert!(none.is_none());

        let ix = sc.locate(LATTICE, Which::Last, 0).unwrap();
        assert_eq!(ix, 6);
    }

    #[test]
    fn test_capture_parse_group_bounds() {
        let sc = LineScanner::new(SAMPLE);
        let pat = r"^volume of cell *: +([-.E0-9]+)$";
        let ix = sc.locate(pat, Which::Last, 0).unwrap();
        assert_eq!(sc.capture_parse::<f64>(ix, pat, 1).unwrap(), 68.921);

        for group in [0, 2] {
            let err = sc.capture_parse::<f64>(ix, pat, group).unwrap_err();
            assert!(matches!(err, ScanError::MalformedTable { line: 10, .. }));
        }
    }
}
