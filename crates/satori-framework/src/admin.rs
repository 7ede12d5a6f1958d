//! Bot administrators over `admin.json`.

use std::path::Path;

use crate::error::FrameworkResult;
use crate::store::JsonFile;

/// File name of the admin list inside the data directory.
pub const ADMIN_FILE: &str = "admin.json";

/// Store of administrator user ids.
#[derive(Debug)]
pub struct AdminStore {
    file: JsonFile<Vec<String>>,
}

impl AdminStore {
    /// Opens `admin.json` inside `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            file: JsonFile::new(data_dir.as_ref().join(ADMIN_FILE)),
        }
    }

    pub async fn list(&self) -> FrameworkResult<Vec<String>> {
        self.file.read().await
    }

    pub async fn is_admin(&self, user_id: &str) -> FrameworkResult<bool> {
        Ok(self.list().await?.iter().any(|id| id == user_id))
    }

    /// Grants admin rights and returns the reply text.
    pub async fn add(&self, user_id: &str) -> String {
        let result = self
            .file
            .update(|admins| {
                if admins.iter().any(|id| id == user_id) {
                    return false;
                }
                admins.push(user_id.to_string());
                true
            })
            .await;
        match result {
            Ok(true) => format!("<√> 已将用户 {user_id} 设置为管理员。"),
            Ok(false) => format!("<!> 用户 {user_id} 已经是管理员了。"),
            Err(e) => format!("<×> 设置 {user_id} 为管理员时出错：\n{e}"),
        }
    }

    /// Revokes admin rights and returns the reply text.
    pub async fn remove(&self, user_id: &str) -> String {
        let result = self
            .file
            .update(|admins| {
                let before = admins.len();
                admins.retain(|id| id != user_id);
                admins.len() != before
            })
            .await;
        match result {
            Ok(true) => format!("<√> 已将用户 {user_id} 管理员权限移除。"),
            Ok(false) => format!("<!> 用户 {user_id} 不是管理员。"),
            Err(e) => format!("<×> 移除 {user_id} 管理权限时出错：\n{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = AdminStore::open(dir.path());

        assert_eq!(store.add("42").await, "<√> 已将用户 42 设置为管理员。");
        assert_eq!(store.add("42").await, "<!> 用户 42 已经是管理员了。");
        assert!(store.is_admin("42").await.unwrap());

        assert_eq!(store.remove("42").await, "<√> 已将用户 42 管理员权限移除。");
        assert_eq!(store.remove("42").await, "<!> 用户 42 不是管理员。");
        assert!(store.list().await.unwrap().is_empty());
    }
}
