//! # XML 路径查找
//!
//! 在 `roxmltree` 节点上求值一个极简路径语言，支持三种步：
//! - `tag`
//! - `tag[@attr='value']`
//! - `tag[last()]`（每个父节点下匹配的最后一个）
//!
//! 标量与矩阵读取要求路径恰好匹配一个节点（矩阵为每行一个节点）。
//!
//! ## 依赖关系
//! - 被 `parsers/vasprun.rs`, `parsers/xml_array.rs` 使用
//! - 使用 `roxmltree` crate

use crate::error::{Result, ScanError};

use roxmltree::Node;
use std::str::FromStr;

/// 单步谓词
#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    None,
    Attr(String, String),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    tag: String,
    predicate: Predicate,
}

fn parse_step(path: &str, raw: &str) -> Result<Step> {
    let bad = |reason: &str| ScanError::parse(format!("xml path {:?}", path), reason.to_string());

    let Some(open) = raw.find('[') else {
        if raw.is_empty() {
            return Err(bad("empty step"));
        }
        return Ok(Step {
            tag: raw.to_string(),
            predicate: Predicate::None,
        });
    };

    if !raw.ends_with(']') {
        return Err(bad("unterminated predicate"));
    }
    let tag = raw[..open].to_string();
    let inner = &raw[open + 1..raw.len() - 1];

    let predicate = if inner == "last()" {
        Predicate::Last
    } else if let Some(rest) = inner.strip_prefix('@') {
        let (attr, value) = rest.split_once('=').ok_or_else(|| bad("predicate needs '='"))?;
        let value = value.trim();
        let unquoted = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
            .ok_or_else(|| bad("predicate value must be quoted"))?;
        Predicate::Attr(attr.trim().to_string(), unquoted.to_string())
    } else {
        return Err(bad("unsupported predicate"));
    };

    Ok(Step { tag, predicate })
}

fn parse_path(path: &str) -> Result<Vec<Step>> {
    path.split('/').map(|raw| parse_step(path, raw)).collect()
}

/// 返回路径匹配的全部节点（文档顺序）
pub fn find_all<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Result<Vec<Node<'a, 'input>>> {
    let steps = parse_path(path)?;
    let mut current = vec![node];

    for step in &steps {
        let mut next = Vec::new();
        for parent in &current {
            let mut matched: Vec<Node<'a, 'input>> = parent
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == step.tag)
                .filter(|c| match &step.predicate {
                    Predicate::Attr(attr, value) => c.attribute(attr.as_str()) == Some(value.as_str()),
                    _ => true,
                })
                .collect();
            if step.predicate == Predicate::Last {
                matched = matched.pop().into_iter().collect();
            }
            next.extend(matched);
        }
        current = next;
    }
    Ok(current)
}

/// 恰好一个匹配
pub fn find_one<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Result<Node<'a, 'input>> {
    let mut nodes = find_all(node, path)?;
    match nodes.len() {
        0 => Err(ScanError::XmlPathNotFound {
            path: path.to_string(),
        }),
        1 => Ok(nodes.remove(0)),
        n => Err(ScanError::XmlPathAmbiguous {
            path: path.to_string(),
            found: n,
        }),
    }
}

/// 零个或一个匹配
pub fn find_optional<'a, 'input>(
    node: Node<'a, 'input>,
    path: &str,
) -> Result<Option<Node<'a, 'input>>> {
    match find_one(node, path) {
        Ok(n) => Ok(Some(n)),
        Err(ScanError::XmlPathNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// 唯一节点的文本（去除首尾空白）
pub fn get_string(node: Node, path: &str) -> Result<String> {
    let found = find_one(node, path)?;
    Ok(found.text().unwrap_or("").trim().to_string())
}

/// 唯一节点的单个 token 解析为 `T`
pub fn get_scalar<T: FromStr>(node: Node, path: &str) -> Result<T> {
    let text = get_string(node, path)?;
    let toks: Vec<&str> = text.split_whitespace().collect();
    if toks.len() != 1 {
        return Err(ScanError::parse(
            path,
            format!("expected one token, found {:?}", text),
        ));
    }
    toks[0]
        .parse::<T>()
        .map_err(|_| ScanError::parse(path, format!("invalid value {:?}", toks[0])))
}

/// 每个匹配节点一行的浮点矩阵
///
/// `nrow` / `ncol` 为 0 表示不限。所有行的列数必须相同。
pub fn get_raw_array(node: Node, path: &str, nrow: usize, ncol: usize) -> Result<Vec<Vec<f64>>> {
    let nodes = find_all(node, path)?;
    if nodes.is_empty() {
        return Err(ScanError::XmlPathNotFound {
            path: path.to_string(),
        });
    }
    if nrow > 0 && nodes.len() != nrow {
        return Err(ScanError::parse(
            path,
            format!("expected {} rows, found {}", nrow, nodes.len()),
        ));
    }

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(nodes.len());
    for n in &nodes {
        let text = n.text().unwrap_or("");
        let row = text
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| ScanError::parse(path, format!("invalid float {:?}", t)))
            })
            .collect::<Result<Vec<f64>>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(ScanError::IrregularArray(format!(
                    "{}: row lengths {} and {}",
                    path,
                    first.len(),
                    row.len()
                )));
            }
        }
        if ncol > 0 && row.len() != ncol {
            return Err(ScanError::parse(
                path,
                format!("expected {} columns, found {}", ncol, row.len()),
            ));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// N×3 矩阵
pub fn get_rows3(node: Node, path: &str, nrow: usize) -> Result<Vec<[f64; 3]>> {
    let rows = get_raw_array(node, path, nrow, 3)?;
    Ok(rows.into_iter().map(|r| [r[0], r[1], r[2]]).collect())
}

/// 3×3 矩阵
pub fn get_mat3(node: Node, path: &str) -> Result<[[f64; 3]; 3]> {
    let rows = get_rows3(node, path, 3)?;
    Ok([rows[0], rows[1], rows[2]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    const XML: &str = r#"<modeling>
  <generator>
    <i name="program" type="string">vasp </i>
    <i name="date" type="string">2013 10 18 </i>
  </generator>
  <calculation><i name="e">1.0</i></calculation>
  <calculation><i name="e">2.0</i></calculation>
  <structure name="finalpos">
    <crystal>
      <varray name="basis">
        <v>4.0 0.0 0.0</v>
        <v>0.0 4.0 0.0</v>
        <v>0.0 0.0 4.0</v>
      </varray>
    </crystal>
  </structure>
</modeling>"#;

    #[test]
    fn test_parse_step() {
        let step = parse_step("p", "i[@name='date']").unwrap();
        assert_eq!(step.tag, "i");
        assert_eq!(
            step.predicate,
            Predicate::Attr("name".to_string(), "date".to_string())
        );
        assert_eq!(parse_step("p", "calculation[last()]").unwrap().predicate, Predicate::Last);
        assert!(parse_step("p", "i[@name=date]").is_err());
        assert!(parse_step("p", "i[1]").is_err());
    }

    #[test]
    fn test_get_string_and_scalar() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();
        assert_eq!(get_string(root, "generator/i[@name='date']").unwrap(), "2013 10 18");
        let e: f64 = get_scalar(root, "calculation[last()]/i[@name='e']").unwrap();
        assert_eq!(e, 2.0);
    }

    #[test]
    fn test_match_count_errors() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();
        assert!(matches!(
            get_string(root, "calculation/i"),
            Err(ScanError::XmlPathAmbiguous { found: 2, .. })
        ));
        assert!(matches!(
            get_string(root, "incar/i[@name='ALGO']"),
            Err(ScanError::XmlPathNotFound { .. })
        ));
        assert!(find_optional(root, "incar").unwrap().is_none());
    }

    #[test]
    fn test_get_mat3() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();
        let m = get_mat3(root, "structure[@name='finalpos']/crystal/varray[@name='basis']/v").unwrap();
        assert_eq!(m[1][1], 4.0);
        assert!(get_raw_array(root, "structure/crystal/varray/v", 2, 0).is_err());
    }
}
