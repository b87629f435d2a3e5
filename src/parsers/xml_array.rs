//! # vasprun.xml `<array>` 解码器
//!
//! 把嵌套的 `<array>/<dimension>/<field>/<set>/<r|rc>` 编码解码为
//! 字段名 → n 维行主序数组。
//!
//! ```text
//! <array name="atoms">
//!   <dimension dim="1">ion</dimension>
//!   <field type="string">element</field>
//!   <field type="int">atomtype</field>
//!   <set>
//!     <rc><c>Cl</c><c>   1</c></rc>
//!     <rc><c>Na</c><c>   2</c></rc>
//!   </set>
//! </array>
//! ```
//!
//! `<dimension>` 按最低位优先排列（`dim="1"` 变化最快），解码时反转。
//! 各维长度在第一次出现时确定，之后每次出现都必须一致。
//! 每个字段的标量类型取所有 token 中最宽的一种：`Int < Float < Str`。
//!
//! ## 依赖关系
//! - 被 `parsers/vasprun.rs` 使用
//! - 使用 `parsers/xml_path.rs`, `roxmltree` crate

use super::xml_path;
use crate::error::{Result, ScanError};

use roxmltree::Node;

/// 字段标量类型，按宽度排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldType {
    Int,
    Float,
    Str,
}

impl FieldType {
    fn of_token(tok: &str) -> Self {
        if tok.parse::<i64>().is_ok() {
            FieldType::Int
        } else if tok.parse::<f64>().is_ok() {
            FieldType::Float
        } else {
            FieldType::Str
        }
    }
}

/// 按推断类型存放的字段数据（行主序展平）
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl FieldData {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldData::Int(_) => FieldType::Int,
            FieldData::Float(_) => FieldType::Float,
            FieldData::Str(_) => FieldType::Str,
        }
    }
}

/// 解码结果
#[derive(Debug, Clone)]
pub struct DecodedArray {
    /// 最高位维在前
    pub dim_names: Vec<String>,
    pub dim_lens: Vec<usize>,
    pub fields: Vec<(String, FieldData)>,
}

impl DecodedArray {
    pub fn field(&self, name: &str) -> Result<&FieldData> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
            .ok_or_else(|| ScanError::IrregularArray(format!("no field named {:?}", name)))
    }

    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        Ok(match self.field(name)? {
            FieldData::Int(v) => v.iter().map(|x| x.to_string()).collect(),
            FieldData::Float(v) => v.iter().map(|x| x.to_string()).collect(),
            FieldData::Str(v) => v.clone(),
        })
    }

    /// 整数或浮点字段读为 `f64`
    pub fn floats(&self, name: &str) -> Result<Vec<f64>> {
        match self.field(name)? {
            FieldData::Int(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            FieldData::Float(v) => Ok(v.clone()),
            FieldData::Str(_) => Err(ScanError::IrregularArray(format!(
                "field {:?} is not numeric",
                name
            ))),
        }
    }

    pub fn ints(&self, name: &str) -> Result<Vec<i64>> {
        match self.field(name)? {
            FieldData::Int(v) => Ok(v.clone()),
            other => Err(ScanError::IrregularArray(format!(
                "field {:?} has type {:?}, expected Int",
                name,
                other.field_type()
            ))),
        }
    }

    /// 三维数值字段，形状 `dim_lens[0] × dim_lens[1] × dim_lens[2]`
    pub fn floats3(&self, name: &str) -> Result<Vec<Vec<Vec<f64>>>> {
        if self.dim_lens.len() != 3 {
            return Err(ScanError::IrregularArray(format!(
                "field {:?} has {} dimensions, expected 3",
                name,
                self.dim_lens.len()
            )));
        }
        let flat = self.floats(name)?;
        let (n1, n2) = (self.dim_lens[1], self.dim_lens[2]);
        Ok(flat
            .chunks(n1 * n2)
            .map(|block| block.chunks(n2).map(|row| row.to_vec()).collect())
            .collect())
    }
}

/// 路径恰好匹配一个 `<array>` 并解码
pub fn get_array_by_path(base: Node, path: &str) -> Result<DecodedArray> {
    let node = xml_path::find_one(base, path)?;
    decode_array(node)
}

/// 解码单个 `<array>` 节点
pub fn decode_array(array: Node) -> Result<DecodedArray> {
    let mut dim_names: Vec<String> = child_elements(array, "dimension")
        .map(|n| n.text().unwrap_or("").trim().to_string())
        .collect();
    if dim_names.is_empty() {
        return Err(ScanError::IrregularArray("no <dimension> found".to_string()));
    }
    dim_names.reverse();

    let field_names: Vec<String> = child_elements(array, "field")
        .map(|n| n.text().unwrap_or("").trim().to_string())
        .collect();
    if field_names.is_empty() {
        return Err(ScanError::IrregularArray("no <field> found".to_string()));
    }

    let sets: Vec<Node> = child_elements(array, "set").collect();
    if sets.len() != 1 {
        return Err(ScanError::IrregularArray(format!(
            "expected one top-level <set>, found {}",
            sets.len()
        )));
    }

    let mut dim_lens: Vec<Option<usize>> = vec![None; dim_names.len()];
    let mut tokens: Vec<Vec<String>> = vec![Vec::new(); field_names.len()];
    descend(sets[0], 0, &mut dim_lens, &mut tokens)?;

    let dim_lens: Vec<usize> = dim_lens.into_iter().map(|d| d.unwrap_or(0)).collect();
    let expected: usize = dim_lens.iter().product();

    let mut fields = Vec::with_capacity(field_names.len());
    for (name, toks) in field_names.into_iter().zip(tokens) {
        if toks.len() != expected {
            return Err(ScanError::IrregularArray(format!(
                "field {:?} has {} values, shape {:?} needs {}",
                name,
                toks.len(),
                dim_lens,
                expected
            )));
        }
        let data = convert_field(&name, toks)?;
        fields.push((name, data));
    }

    Ok(DecodedArray {
        dim_names,
        dim_lens,
        fields,
    })
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == tag)
}

/// 记录或校验第 `idim` 维的长度
fn check_dim(dim_lens: &mut [Option<usize>], idim: usize, found: usize) -> Result<()> {
    match dim_lens[idim] {
        None => {
            dim_lens[idim] = Some(found);
            Ok(())
        }
        Some(len) if len == found => Ok(()),
        Some(len) => Err(ScanError::IrregularArray(format!(
            "dimension {} has length {} here but {} before",
            idim, found, len
        ))),
    }
}

fn descend(
    set: Node,
    idim: usize,
    dim_lens: &mut [Option<usize>],
    tokens: &mut [Vec<String>],
) -> Result<()> {
    let nfield = tokens.len();

    if idim + 1 < dim_lens.len() {
        let subsets: Vec<Node> = child_elements(set, "set").collect();
        check_dim(dim_lens, idim, subsets.len())?;
        for sub in subsets {
            descend(sub, idim + 1, dim_lens, tokens)?;
        }
        return Ok(());
    }

    // 最内层：<rc><c>..</c></rc> 或 <r>..</r>
    let rc_rows: Vec<Node> = child_elements(set, "rc").collect();
    let r_rows: Vec<Node> = child_elements(set, "r").collect();

    if !rc_rows.is_empty() {
        check_dim(dim_lens, idim, rc_rows.len())?;
        for row in rc_rows {
            let cells: Vec<Node> = child_elements(row, "c").collect();
            if cells.len() != nfield {
                return Err(ScanError::IrregularArray(format!(
                    "<rc> row has {} cells, expected {}",
                    cells.len(),
                    nfield
                )));
            }
            for (ifield, c) in cells.iter().enumerate() {
                tokens[ifield].push(c.text().unwrap_or("").trim().to_string());
            }
        }
    } else if !r_rows.is_empty() {
        check_dim(dim_lens, idim, r_rows.len())?;
        for row in r_rows {
            let text = row.text().unwrap_or("");
            let toks: Vec<&str> = text.split_whitespace().collect();
            if toks.len() != nfield {
                return Err(ScanError::IrregularArray(format!(
                    "<r> row has {} tokens, expected {}: {:?}",
                    toks.len(),
                    nfield,
                    text.trim()
                )));
            }
            for (ifield, t) in toks.iter().enumerate() {
                tokens[ifield].push(t.to_string());
            }
        }
    } else {
        return Err(ScanError::IrregularArray(
            "innermost <set> has neither <rc> nor <r> rows".to_string(),
        ));
    }
    Ok(())
}

fn convert_field(name: &str, toks: Vec<String>) -> Result<FieldData> {
    let ftype = toks
        .iter()
        .map(|t| FieldType::of_token(t))
        .max()
        .unwrap_or(FieldType::Str);

    let bad = |t: &str| ScanError::IrregularArray(format!("field {:?}: bad token {:?}", name, t));

    Ok(match ftype {
        FieldType::Int => FieldData::Int(
            toks.iter()
                .map(|t| t.parse::<i64>().map_err(|_| bad(t)))
                .collect::<Result<_>>()?,
        ),
        FieldType::Float => FieldData::Float(
            toks.iter()
                .map(|t| t.parse::<f64>().map_err(|_| bad(t)))
                .collect::<Result<_>>()?,
        ),
        FieldType::Str => FieldData::Str(toks),
    })
}
