//! # kgrec-algo - 知识图谱试题推荐核心算法库
//!
//! 本 crate 提供纯 Rust 实现的推荐流程:
//!
//! - **Mastery** - 按知识点统计答题正确率并划分掌握等级 (1-5)
//! - **Graph Enrichment** - 将掌握等级写入知识图谱节点 (未学习为 0)
//! - **Weak Point Selection** - 找出已学习知识点中掌握等级最低的集合
//! - **IRT** - 三参数 IRT 模型计算答对概率并对候选试题排序
//!
//! ## 设计理念
//!
//! - **纯函数** - 每个阶段只依赖输入，无全局状态、无 I/O
//! - **显式配置** - 配置通过参数传入，不读取环境变量
//! - **局部失败** - 单道试题参数异常只影响该试题，不中断整批排序
//!
//! ## 模块结构
//!
//! - [`mastery`] - 掌握度计算
//! - [`graph`] - 知识图谱掌握度标注
//! - [`selection`] - 最薄弱知识点选择
//! - [`irt`] - IRT 答对概率与排序
//! - [`recommend`] - 串联以上阶段的推荐流程
//! - [`sanitize`] - 数据清洗 (数值解析、知识点拆分)
//! - [`config`] - 配置
//! - [`error`] - 错误类型
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use kgrec_algo::{rank_candidates, IrtItem, LearnerAbility};
//!
//! let items = vec![
//!     IrtItem::new("q1", 1.2, 0.0, 0.2),
//!     IrtItem::new("q2", 0.8, 1.5, 0.25),
//! ];
//! let ranked = rank_candidates(&items, &LearnerAbility::new("5583697", 0.0));
//! assert_eq!(ranked.ranked[0].item_id.as_str(), "q1");
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod config;
pub mod error;
pub mod graph;
pub mod irt;
pub mod mastery;
pub mod recommend;
pub mod sanitize;
pub mod selection;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

pub use config::{MasteryConfig, OutcomePolicy, RankingConfig};
pub use error::{AlgoError, InvalidMasteryLevel, ItemFailureReason};

/// 重新导出各阶段入口
pub use graph::{enrich, enrich_with_table};
pub use irt::{probability_correct, rank_candidates, AbilityScorer, IrtParams};
pub use mastery::MasteryCalculator;
pub use recommend::{plan, recommend, ItemCatalog, KnowledgeLink, Recommendation, RecommendationPlan};
pub use selection::{select_weakest, MasterySource};
