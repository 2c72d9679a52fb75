use sha2::{Digest, Sha256};

pub mod hash {
    use super::*;

    pub fn calculate_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    pub fn hash_password(salt: &str, password: &str) -> String {
        calculate_sha256(format!("{salt}:{password}").as_bytes())
    }
}

pub mod cover {
    pub const DEFAULT_COVER: &str = "https://images.unsplash.com/photo-1543002588-bfa74002ed7e?ixlib=rb-1.2.1&auto=format&fit=crop&w=800&q=80";

    /// Turns a stored cover reference into something a browser can load.
    ///
    /// Google Drive share links are rewritten to a direct image host, absolute
    /// URLs pass through, and bare paths resolve against the public storage
    /// bucket when one is known.
    pub fn resolve(cover: Option<&str>, public_base: Option<&str>) -> String {
        let cover = match cover.map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => return DEFAULT_COVER.to_string(),
        };

        if cover.contains("drive.google.com") {
            if let Some(file_id) = drive_file_id(cover) {
                return format!("https://lh3.googleusercontent.com/d/{file_id}");
            }
        }

        if cover.starts_with("http://") || cover.starts_with("https://") {
            return cover.to_string();
        }

        match public_base {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                cover.trim_start_matches('/')
            ),
            None => DEFAULT_COVER.to_string(),
        }
    }

    fn drive_file_id(url: &str) -> Option<&str> {
        let id = if let Some(pos) = url.find("?id=").or_else(|| url.find("&id=")) {
            url[pos + 4..].split('&').next()
        } else if let Some((_, rest)) = url.split_once("/file/d/") {
            rest.split('/').next()
        } else {
            None
        };
        id.filter(|id| !id.is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn drive_links_are_rewritten() {
            assert_eq!(
                resolve(Some("https://drive.google.com/file/d/abc123/view"), None),
                "https://lh3.googleusercontent.com/d/abc123"
            );
            assert_eq!(
                resolve(Some("https://drive.google.com/open?id=xyz&usp=sharing"), None),
                "https://lh3.googleusercontent.com/d/xyz"
            );
            assert_eq!(
                resolve(Some("https://drive.google.com/thumbnail?sz=w1000&id=q9"), None),
                "https://lh3.googleusercontent.com/d/q9"
            );
        }

        #[test]
        fn relative_paths_use_the_bucket() {
            assert_eq!(
                resolve(
                    Some("gatsby.jpg"),
                    Some("https://x.supabase.co/storage/v1/object/public/covers/")
                ),
                "https://x.supabase.co/storage/v1/object/public/covers/gatsby.jpg"
            );
            assert_eq!(resolve(Some("gatsby.jpg"), None), DEFAULT_COVER);
            assert_eq!(resolve(None, None), DEFAULT_COVER);
            assert_eq!(resolve(Some("   "), None), DEFAULT_COVER);
        }

        #[test]
        fn absolute_urls_pass_through() {
            let url = "https://cdn.example.com/a.png";
            assert_eq!(resolve(Some(url), Some("https://ignored")), url);
        }
    }
}
