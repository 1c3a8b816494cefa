//! Public catalog content: lesson offerings, testimonials and the blog.

use std::sync::Arc;

use super::collection::Collection;
use crate::error::ServiceResult;
use crate::models::{BlogPost, Lesson, Testimonial};
use crate::store::{collections, Filter, RecordStore, Sort};

pub fn lessons(store: Arc<dyn RecordStore>) -> Collection<Lesson> {
    Collection::new(store, collections::SERVICES)
}

pub fn testimonials(store: Arc<dyn RecordStore>) -> Collection<Testimonial> {
    Collection::new(store, collections::TESTIMONIALS)
}

#[derive(Clone)]
pub struct BlogService {
    posts: Collection<BlogPost>,
}

impl BlogService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            posts: Collection::new(store, collections::BLOG_POSTS)
                .with_sort(Sort::desc("published_date")),
        }
    }

    pub fn posts(&self) -> &Collection<BlogPost> {
        &self.posts
    }

    /// Newest publication first.
    pub async fn get_all(&self) -> ServiceResult<Vec<BlogPost>> {
        self.posts.get_all().await
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Option<BlogPost>> {
        self.posts.find_first(&Filter::eq("slug", slug)).await
    }
}
