// 基本的なデータ型と数学ユーティリティ
pub mod common;

// テーブルの着席配置インターフェース（trait）定義
pub mod traits;

// 各テーブル形状の実装
pub mod table;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use table::{CircularTable, LayoutError, RectangularTable, SideOccupancy, TableOutline};
