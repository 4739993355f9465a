//! Paginated listings and the video lifecycle.

use std::sync::Arc;

use parking_lot::Mutex;
use vidforge_common::{Error, Quality, Result, VideoId};
use vidforge_db::models::{Page, UserSummary, Video, VideoSummary};
use vidforge_db::{get_conn, queries, DbPool};

/// Catalog store backed by the `users` and `videos` tables.
///
/// Every listing uses the same fixed page size.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Inner>,
}

struct Inner {
    pool: DbPool,
    lock: Mutex<()>,
    page_size: u32,
}

impl CatalogStore {
    pub fn new(pool: DbPool, page_size: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                lock: Mutex::new(()),
                page_size: page_size.max(1),
            }),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    /// One page of users in registration order.
    pub fn list_users(&self, page: u32) -> Result<Page<UserSummary>> {
        let per_page = self.inner.page_size;

        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        let total = queries::count_users(&conn)?;
        let items = queries::list_users(&conn, per_page, Page::<()>::offset(page, per_page))?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// One page of playable videos, optionally limited to one author.
    ///
    /// Videos still being processed are never listed.
    pub fn list_videos(&self, page: u32, author: Option<&str>) -> Result<Page<VideoSummary>> {
        let per_page = self.inner.page_size;

        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        let total = queries::count_ready_videos(&conn, author)?;
        let items =
            queries::list_ready_videos(&conn, author, per_page, Page::<()>::offset(page, per_page))?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// Full record for one video, pending or ready.
    pub fn get_video_info(&self, id: VideoId) -> Result<Video> {
        let conn = get_conn(&self.inner.pool)?;
        queries::get_video(&conn, id)?.ok_or_else(|| Error::not_found("video", id))
    }

    /// Insert a pending video and return its id.
    pub fn start_upload(&self, title: &str, author: &str) -> Result<VideoId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("title must not be empty"));
        }

        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        let id = queries::create_pending_video(&conn, author, title)?;

        tracing::debug!(video_id = %id, author = %author, "Created pending video");
        Ok(id)
    }

    /// Mark a pending video ready.
    pub fn finalize_video(
        &self,
        id: VideoId,
        length: f64,
        num_segments: u32,
        max_quality: Quality,
    ) -> Result<()> {
        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        queries::finalize_video(&conn, id, length, num_segments, max_quality.level())?;

        tracing::info!(
            video_id = %id,
            length,
            num_segments,
            quality = %max_quality,
            "Video ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use vidforge_db::init_memory_pool;

    fn catalog(page_size: u32) -> CatalogStore {
        CatalogStore::new(init_memory_pool().unwrap(), page_size)
    }

    fn add_user(store: &CatalogStore, name: &str) {
        let conn = get_conn(&store.inner.pool).unwrap();
        queries::create_user(&conn, name, "hash").unwrap();
    }

    #[test]
    fn test_user_pages_cover_everyone_once() {
        let store = catalog(4);
        for i in 0..10 {
            add_user(&store, &format!("user{i}"));
        }

        let first = store.list_users(0).unwrap();
        assert_eq!(first.max_page, 2);
        assert_eq!(first.total_count, 10);

        let mut seen = HashSet::new();
        let mut total = 0;
        for page in 0..=first.max_page {
            let page = store.list_users(page).unwrap();
            total += page.items.len();
            for user in page.items {
                assert!(seen.insert(user.username));
            }
        }
        assert_eq!(total, 10);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let store = catalog(25);
        add_user(&store, "alice");
        let page = store.list_users(5).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.current_page, 5);
        assert_eq!(page.max_page, 0);
    }

    #[test]
    fn test_video_lifecycle() {
        let store = catalog(25);
        add_user(&store, "alice");

        let id = store.start_upload("holiday", "alice").unwrap();
        assert!(store.list_videos(0, Some("alice")).unwrap().items.is_empty());
        assert!(!store.get_video_info(id).unwrap().is_ready());

        store.finalize_video(id, 10.0, 4, Quality::P240).unwrap();

        let page = store.list_videos(0, Some("alice")).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "holiday");

        let video = store.get_video_info(id).unwrap();
        assert_eq!(video.max_quality, 1);
        assert_eq!(video.top_quality(), Some(Quality::P240));
    }

    #[test]
    fn test_get_missing_video() {
        let store = catalog(25);
        assert_matches!(
            store.get_video_info(VideoId::new(77)),
            Err(Error::NotFound { .. })
        );
    }

    #[test]
    fn test_empty_title_rejected() {
        let store = catalog(25);
        add_user(&store, "alice");
        assert_matches!(store.start_upload("   ", "alice"), Err(Error::InvalidInput(_)));
    }
}
