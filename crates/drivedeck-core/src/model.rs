//! 数据模型
//!
//! 文件条目、权限位掩码以及与服务端 JSON 格式兼容的权限描述。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 目录列表中的一个文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileEntry {
    /// 文件名（在同一目录中唯一）
    pub name: String,
    /// 所在目录
    pub dir: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl FileEntry {
    pub fn new(dir: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// 完整路径 `<dir>/<name>`
    pub fn path(&self) -> String {
        join_path(&self.dir, &self.name)
    }
}

/// 拼接目录和文件名，保证中间只有一个 `/`
pub fn join_path(dir: &str, name: &str) -> String {
    let mut path = if dir.is_empty() {
        "/".to_string()
    } else {
        dir.to_string()
    };
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(name.trim_start_matches('/'));
    path
}

/// 权限位掩码
///
/// 位定义与服务端一致: read=1, create=2, update=4, delete=8,
/// update_permissions=16, share=32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const READ: Permissions = Permissions(1);
    pub const CREATE: Permissions = Permissions(1 << 1);
    pub const UPDATE: Permissions = Permissions(1 << 2);
    pub const DELETE: Permissions = Permissions(1 << 3);
    pub const UPDATE_PERMISSIONS: Permissions = Permissions(1 << 4);
    pub const SHARE: Permissions = Permissions(1 << 5);
    pub const ALL: Permissions = Permissions(0b11_1111);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Permissions(bits & Self::ALL.0)
    }

    pub fn has(self, other: Permissions) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn add(self, other: Permissions) -> Self {
        Permissions(self.0 | other.0)
    }

    #[must_use]
    pub fn remove(self, other: Permissions) -> Self {
        Permissions(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 已设置的权限名称（按位顺序）
    pub fn names(self) -> Vec<&'static str> {
        PermissionKind::ALL
            .iter()
            .filter(|kind| self.has(kind.bit()))
            .map(|kind| kind.name())
            .collect()
    }

    /// 从权限名称列表解析
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Permissions::NONE, |acc, name| {
            let kind: PermissionKind = name.as_ref().parse()?;
            Ok(acc.add(kind.bit()))
        })
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join(", "))
    }
}

/// 单个权限动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Read,
    Create,
    Update,
    Delete,
    UpdatePermissions,
    Share,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 6] = [
        PermissionKind::Read,
        PermissionKind::Create,
        PermissionKind::Update,
        PermissionKind::Delete,
        PermissionKind::UpdatePermissions,
        PermissionKind::Share,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PermissionKind::Read => "read",
            PermissionKind::Create => "create",
            PermissionKind::Update => "update",
            PermissionKind::Delete => "delete",
            PermissionKind::UpdatePermissions => "update_permissions",
            PermissionKind::Share => "share",
        }
    }

    pub fn bit(self) -> Permissions {
        match self {
            PermissionKind::Read => Permissions::READ,
            PermissionKind::Create => Permissions::CREATE,
            PermissionKind::Update => Permissions::UPDATE,
            PermissionKind::Delete => Permissions::DELETE,
            PermissionKind::UpdatePermissions => Permissions::UPDATE_PERMISSIONS,
            PermissionKind::Share => Permissions::SHARE,
        }
    }
}

impl std::str::FromStr for PermissionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| format!("unknown permission: {s}"))
    }
}

/// 权限主体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum ObjectType {
    #[default]
    User = 0,
    Group = 1,
    Everyone = 2,
}

impl From<ObjectType> for u8 {
    fn from(t: ObjectType) -> u8 {
        t as u8
    }
}

impl TryFrom<u8> for ObjectType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ObjectType::User),
            1 => Ok(ObjectType::Group),
            2 => Ok(ObjectType::Everyone),
            other => Err(format!("unknown object type: {other}")),
        }
    }
}

impl std::str::FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ObjectType::User),
            "group" => Ok(ObjectType::Group),
            "everyone" => Ok(ObjectType::Everyone),
            other => Err(format!("unknown object type: {other}")),
        }
    }
}

/// 单个权限动作的开关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum ToggleState {
    #[default]
    Unset = 0,
    On = 1,
    Off = 2,
}

impl From<ToggleState> for u8 {
    fn from(s: ToggleState) -> u8 {
        s as u8
    }
}

impl TryFrom<u8> for ToggleState {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ToggleState::Unset),
            1 => Ok(ToggleState::On),
            2 => Ok(ToggleState::Off),
            other => Err(format!("unknown toggle state: {other}")),
        }
    }
}

/// 一条权限规则
///
/// JSON 格式: `{"object_type": 0, "object": "alice", "permissions": {"read": 1, ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Permission {
    pub object_type: ObjectType,
    pub object: String,
    pub permissions: BTreeMap<PermissionKind, ToggleState>,
}

impl Permission {
    pub fn new(object_type: ObjectType, object: impl Into<String>) -> Self {
        Self {
            object_type,
            object: object.into(),
            permissions: BTreeMap::new(),
        }
    }

    /// 允许给定的权限
    #[must_use]
    pub fn allow(mut self, perms: Permissions) -> Self {
        self.set(perms, ToggleState::On);
        self
    }

    /// 拒绝给定的权限
    #[must_use]
    pub fn deny(mut self, perms: Permissions) -> Self {
        self.set(perms, ToggleState::Off);
        self
    }

    fn set(&mut self, perms: Permissions, state: ToggleState) {
        for kind in PermissionKind::ALL {
            if perms.has(kind.bit()) {
                self.permissions.insert(kind, state);
            }
        }
    }

    /// 折叠为 (allow, deny) 位掩码
    pub fn calculate(&self) -> (Permissions, Permissions) {
        self.permissions.iter().fold(
            (Permissions::NONE, Permissions::NONE),
            |(allow, deny), (kind, state)| match state {
                ToggleState::On => (allow.add(kind.bit()), deny),
                ToggleState::Off => (allow, deny.add(kind.bit())),
                ToggleState::Unset => (allow, deny),
            },
        )
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    /// 解析 `<object_type>:<object>:<perm,perm,...>`，例如 `user:alice:read,update`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let object_type: ObjectType = parts.next().unwrap_or_default().parse()?;
        let object = parts.next().unwrap_or_default();
        let perms = match parts.next() {
            Some(list) if !list.is_empty() => Permissions::from_names(list.split(','))?,
            _ => return Err(format!("missing permission list in '{s}'")),
        };
        Ok(Permission::new(object_type, object).allow(perms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/docs", "a.txt"), "/docs/a.txt");
        assert_eq!(join_path("/docs/", "a.txt"), "/docs/a.txt");
        assert_eq!(join_path("", "a.txt"), "/a.txt");
        assert_eq!(join_path("/", "/a.txt"), "/a.txt");
    }

    #[test]
    fn test_permission_bits() {
        let perms = Permissions::READ.add(Permissions::SHARE);
        assert_eq!(perms.bits(), 33);
        assert!(perms.has(Permissions::READ));
        assert!(!perms.has(Permissions::DELETE));
        assert_eq!(perms.names(), vec!["read", "share"]);
        assert_eq!(perms.to_string(), "read, share");
        assert_eq!(Permissions::NONE.to_string(), "none");
        assert_eq!(Permissions::from_bits(0xFF), Permissions::ALL);
    }

    #[test]
    fn test_permissions_from_names() {
        let perms = Permissions::from_names(["read", "update_permissions"]).unwrap();
        assert_eq!(perms, Permissions::READ.add(Permissions::UPDATE_PERMISSIONS));
        assert!(Permissions::from_names(["write"]).is_err());
    }

    #[test]
    fn test_permission_json_format() {
        let perm = Permission::new(ObjectType::Group, "staff")
            .allow(Permissions::READ)
            .deny(Permissions::DELETE);
        let json = serde_json::to_value(&perm).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "object_type": 1,
                "object": "staff",
                "permissions": {"read": 1, "delete": 2}
            })
        );

        let parsed: Permission = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, perm);
    }

    #[test]
    fn test_permission_calculate() {
        let perm = Permission::new(ObjectType::User, "alice")
            .allow(Permissions::READ.add(Permissions::UPDATE))
            .deny(Permissions::SHARE);
        let (allow, deny) = perm.calculate();
        assert_eq!(allow, Permissions::READ.add(Permissions::UPDATE));
        assert_eq!(deny, Permissions::SHARE);
    }

    #[test]
    fn test_permission_from_str() {
        let perm: Permission = "group:staff:read,create".parse().unwrap();
        assert_eq!(perm.object_type, ObjectType::Group);
        assert_eq!(perm.object, "staff");
        assert_eq!(perm.calculate().0, Permissions::READ.add(Permissions::CREATE));

        assert!("robot:x:read".parse::<Permission>().is_err());
        assert!("user:alice".parse::<Permission>().is_err());
    }
}
