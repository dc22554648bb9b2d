use crate::models::common::Point2D;
use crate::models::table::TableOutline;

/// 全てのテーブル形状が実装する着席配置インターフェース
pub trait ITable {
    /// テーブルIDの取得
    fn get_id(&self) -> String;

    /// 着席位置の計算（生成順が参加者番号になる）
    fn seat_points(&self) -> Vec<Point2D>;

    /// 描画用のテーブル外形
    fn outline(&self) -> TableOutline;

    /// 着席人数
    fn seat_count(&self) -> usize {
        self.seat_points().len()
    }
}
