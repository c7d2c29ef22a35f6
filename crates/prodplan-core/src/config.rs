//! 引擎配置

use serde::{Deserialize, Serialize};

/// 生產計劃引擎參數配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 計劃前是否先扣除已生產成品庫存
    pub net_finished_goods: bool,

    /// 組合巢狀深度上限（None 表示不限制）
    ///
    /// - `Some(1)`: 僅允許一層子組合
    /// - `None`: 遞迴展開，僅以循環偵測保護
    pub max_composition_depth: Option<usize>,

    /// 單位成本小數位數
    pub cost_scale: u32,

    /// 進度報表是否同時評估可行性（現有庫存能否完成剩餘數量）
    pub feasibility_check: bool,
}

impl EngineConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self {
            net_finished_goods: true,
            max_composition_depth: None,
            cost_scale: 4,
            feasibility_check: true,
        }
    }

    /// 從 JSON 載入配置（缺少的欄位使用預設值）
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::PlanError::Storage(e.to_string()))
    }

    /// 建構器模式：設置是否扣除成品庫存
    pub fn with_net_finished_goods(mut self, net: bool) -> Self {
        self.net_finished_goods = net;
        self
    }

    /// 建構器模式：設置組合深度上限
    ///
    /// # 範例
    /// ```
    /// # use prodplan_core::EngineConfig;
    /// let config = EngineConfig::new().with_max_composition_depth(1); // 僅一層子組合
    /// assert_eq!(config.max_composition_depth, Some(1));
    /// ```
    pub fn with_max_composition_depth(mut self, depth: usize) -> Self {
        self.max_composition_depth = Some(depth);
        self
    }

    /// 建構器模式：設置成本小數位數
    pub fn with_cost_scale(mut self, scale: u32) -> Self {
        self.cost_scale = scale;
        self
    }

    /// 建構器模式：設置是否評估可行性
    pub fn with_feasibility_check(mut self, check: bool) -> Self {
        self.feasibility_check = check;
        self
    }

    /// 檢查深度是否超過上限
    pub fn depth_exceeded(&self, depth: usize) -> bool {
        self.max_composition_depth
            .map(|limit| depth > limit)
            .unwrap_or(false)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert!(config.net_finished_goods);
        assert_eq!(config.max_composition_depth, None);
        assert_eq!(config.cost_scale, 4);
        assert!(!config.depth_exceeded(50));
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_net_finished_goods(false)
            .with_max_composition_depth(1)
            .with_cost_scale(2)
            .with_feasibility_check(false);

        assert!(!config.net_finished_goods);
        assert!(!config.depth_exceeded(1));
        assert!(config.depth_exceeded(2));
        assert_eq!(config.cost_scale, 2);
        assert!(!config.feasibility_check);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{ "max_composition_depth": 1 }"#).unwrap();

        assert_eq!(config.max_composition_depth, Some(1));
        assert!(config.net_finished_goods);
        assert_eq!(config.cost_scale, 4);
    }

    #[test]
    fn test_invalid_json() {
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
