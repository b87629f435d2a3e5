//! # 物理后处理模块
//!
//! 读取器填充基本字段后调用的纯函数：几何一致性、单位换算、
//! 逐原子展开、费米能与带隙。
//!
//! ## 依赖关系
//! - 被 `parsers/` 使用
//! - 子模块: geometry, species, electronic

pub mod electronic;
pub mod geometry;
pub mod species;
