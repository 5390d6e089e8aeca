//! 任务（Plan）、原语（Primitive）与全局变量

use crate::ProtocolError;
use crate::codec::{get_str, get_str_list, get_u32, put_str, put_str_list};
use bytes::{Buf, BufMut};
use std::collections::BTreeMap;

/// 当前执行任务的描述信息（按需查询，不缓存）
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanInfo {
    /// 原语名称
    pub pt_name: String,
    /// 当前节点名称
    pub node_name: String,
    /// 节点路径
    pub node_path: String,
    /// 节点路径时间周期
    pub node_path_time_period: String,
    /// 节点路径编号
    pub node_path_number: String,
    /// 指派的任务名称
    pub assigned_plan_name: String,
    /// 速度缩放（百分比，1-100）
    pub velocity_scale: u32,
}

impl PlanInfo {
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), ProtocolError> {
        put_str(buf, &self.pt_name)?;
        put_str(buf, &self.node_name)?;
        put_str(buf, &self.node_path)?;
        put_str(buf, &self.node_path_time_period)?;
        put_str(buf, &self.node_path_number)?;
        put_str(buf, &self.assigned_plan_name)?;
        buf.put_u32_le(self.velocity_scale);
        Ok(())
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            pt_name: get_str(buf)?,
            node_name: get_str(buf)?,
            node_path: get_str(buf)?,
            node_path_time_period: get_str(buf)?,
            node_path_number: get_str(buf)?,
            assigned_plan_name: get_str(buf)?,
            velocity_scale: get_u32(buf)?,
        })
    }
}

/// 原语状态（`"name: value"` 形式的字符串列表）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimitiveStates {
    pub entries: Vec<String>,
}

impl PrimitiveStates {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// 按名称查找状态值
    ///
    /// ```
    /// use rdk_protocol::PrimitiveStates;
    ///
    /// let states = PrimitiveStates::new(vec!["reachedTarget: 1".into()]);
    /// assert_eq!(states.get("reachedTarget"), Some("1"));
    /// assert_eq!(states.get("missing"), None);
    /// ```
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            (key.trim() == name).then(|| value.trim())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), ProtocolError> {
        put_str_list(buf, &self.entries)
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self::new(get_str_list(buf)?))
    }
}

/// 全局变量集合（名称 → 值）
///
/// 线上形式为 `name=value` 字符串列表。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalVariables {
    vars: BTreeMap<String, String>,
}

impl GlobalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置变量（链式）
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 合并另一个集合（同名变量被覆盖）
    pub fn merge(&mut self, other: &GlobalVariables) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// 解析 `name=value` 列表
    ///
    /// # 错误
    /// - `ProtocolError::Malformed`: 条目缺少 `=` 或名称为空
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = BTreeMap::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| ProtocolError::Malformed(format!("global variable without '=': {entry:?}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ProtocolError::Malformed(format!(
                    "global variable with empty name: {entry:?}"
                )));
            }
            vars.insert(name.to_string(), value.trim().to_string());
        }
        Ok(Self { vars })
    }

    pub fn to_entries(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), ProtocolError> {
        put_str_list(buf, &self.to_entries())
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Self::from_entries(get_str_list(buf)?)
    }
}

/// 读取 `f64` 形式的全局变量（常用于任务参数化）
pub fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_global_variables_entries() {
        let vars = GlobalVariables::from_entries(["speed = 0.5", "target=home"]).unwrap();
        assert_eq!(vars.get("speed"), Some("0.5"));
        assert_eq!(vars.get("target"), Some("home"));
        assert_eq!(vars.to_entries(), vec!["speed=0.5", "target=home"]);
    }

    #[test]
    fn test_global_variables_rejects_missing_separator() {
        let err = GlobalVariables::from_entries(["speed"]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let err = GlobalVariables::from_entries(["=1"]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_global_variables_merge_overwrites() {
        let mut base = GlobalVariables::new().with("a", "1").with("b", "2");
        base.merge(&GlobalVariables::new().with("b", "3"));
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_plan_info_decode_truncated() {
        let info = PlanInfo {
            pt_name: "MoveL".into(),
            assigned_plan_name: "PLAN-PickPlace".into(),
            velocity_scale: 50,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        info.encode(&mut buf).unwrap();

        let truncated = &buf[..buf.len() - 2];
        let mut reader = truncated;
        assert!(PlanInfo::decode(&mut reader).is_err());

        let mut reader = &buf[..];
        assert_eq!(PlanInfo::decode(&mut reader).unwrap(), info);
    }

    #[test]
    fn test_primitive_states_lookup_trims() {
        let states = PrimitiveStates::new(vec![
            "terminated: 0".into(),
            "reachedTarget :1".into(),
            "malformed".into(),
        ]);
        assert_eq!(states.get("reachedTarget"), Some("1"));
        assert_eq!(states.get("terminated"), Some("0"));
        assert_eq!(states.get("malformed"), None);
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(" 1.5 "), Some(1.5));
        assert_eq!(parse_numeric("abc"), None);
    }
}
