//! Page executor
//!
//! Fetches one page of records from a `RecordSource` and derives the
//! cursors around it.
//!
//! Execution flow (strict order):
//! 1. Fetch `limit + 1` rows past the cursor
//! 2. Drop rows rejected by the record check
//! 3. While the page is short and the source has more rows, refetch from
//!    the last fetched row (bounded by `max_refetches`)
//! 4. Trim to `limit`; a surplus row means another page exists
//! 5. Restore forward order for reverse-paged requests
//! 6. Derive prev/next cursors from the first and last row

use crate::errors::QueryResult;
use crate::paging::PagingCursor;
use crate::record::{Record, RecordCheck};

use super::result::Page;

/// Ordered supply of records for a planned search
pub trait RecordSource {
    /// Fetches up to `limit` records strictly past `cursor` in plan order,
    /// values attached. `None` fetches everything.
    fn fetch(&mut self, cursor: Option<&PagingCursor>, limit: Option<usize>) -> QueryResult<Vec<Record>>;

    /// Cursor pointing at a fetched record
    fn cursor_for(&self, record: &Record) -> PagingCursor;
}

/// Refetch bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Most fetches a single page may take
    pub max_refetches: usize,
    /// Smallest batch requested by a refetch
    pub min_ensure_fetch_limit: usize,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            max_refetches: 100,
            min_ensure_fetch_limit: 10,
        }
    }
}

/// Executes page requests against a source
pub struct PageExecutor<'a, S: RecordSource> {
    source: &'a mut S,
    options: PageOptions,
}

impl<'a, S: RecordSource> PageExecutor<'a, S> {
    pub fn new(source: &'a mut S, options: PageOptions) -> Self {
        Self { source, options }
    }

    /// Fetches the page at `cursor`; `limit` 0 fetches everything.
    pub fn execute(
        &mut self,
        cursor: Option<&PagingCursor>,
        limit: usize,
        check: Option<&RecordCheck>,
    ) -> QueryResult<Page> {
        let reversed = cursor.map_or(false, |c| c.r_order);
        let mut page = Page::default();
        let mut from = cursor.cloned();
        let mut has_more = false;
        let mut exhausted = false;

        for attempt in 0..self.options.max_refetches.max(1) {
            let fetch_limit = if limit == 0 {
                None
            } else {
                let missing = limit.saturating_sub(page.records.len());
                let batch = if attempt == 0 {
                    missing
                } else {
                    missing.max(self.options.min_ensure_fetch_limit)
                };
                Some(batch + 1)
            };

            // Step 1: fetch past the current position
            let fetched = self.source.fetch(from.as_ref(), fetch_limit)?;
            page.fetches += 1;
            page.scanned += fetched.len();
            exhausted = fetch_limit.map_or(true, |l| fetched.len() < l);

            let last = fetched.last().map(|r| self.source.cursor_for(r));

            // Step 2: apply the record check
            for record in fetched {
                let keep = match check {
                    Some(check) => check.accepts(&record)?,
                    None => true,
                };
                if keep {
                    page.records.push(record);
                }
            }

            // Step 4: a surplus row proves there is another page
            if limit > 0 && page.records.len() > limit {
                page.records.truncate(limit);
                has_more = true;
                break;
            }

            if exhausted || check.is_none() {
                break;
            }

            // Step 3: continue after the last row the source returned
            match last {
                Some(mut next) => {
                    next.r_order = reversed;
                    next.l_then = false;
                    from = Some(next);
                }
                None => break,
            }
        }

        // refetch budget ran out before the source did
        if !has_more && !exhausted && limit > 0 && page.records.len() == limit {
            has_more = true;
        }

        // Step 5: reverse-paged rows come back in reversed order
        if reversed {
            page.records.reverse();
        }

        // Step 6: cursors, none for unpaged results
        if limit == 0 {
            return Ok(page);
        }

        let (has_prev, has_next) = if reversed {
            (has_more, true)
        } else {
            (cursor.is_some(), has_more)
        };

        if let (Some(first), Some(last)) = (page.records.first(), page.records.last()) {
            if has_prev {
                let mut prev = self.source.cursor_for(first);
                prev.r_order = true;
                page.prev = Some(prev);
            }
            if has_next {
                page.next = Some(self.source.cursor_for(last));
            }
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use crate::record::RecordValue;
    use serde_json::json;

    /// In-memory source ordered by id ascending
    struct VecSource {
        records: Vec<Record>,
        fetch_log: Vec<Option<usize>>,
    }

    impl VecSource {
        fn new(ids: &[u64]) -> Self {
            Self {
                records: ids
                    .iter()
                    .map(|id| {
                        Record::new(1, 1)
                            .with_id(*id)
                            .with_value(RecordValue::new("n", id.to_string()))
                    })
                    .collect(),
                fetch_log: Vec::new(),
            }
        }
    }

    impl RecordSource for VecSource {
        fn fetch(&mut self, cursor: Option<&PagingCursor>, limit: Option<usize>) -> QueryResult<Vec<Record>> {
            self.fetch_log.push(limit);
            let (reversed, after) = match cursor {
                Some(c) => (c.r_order, c.values()[0].as_u64()),
                None => (false, None),
            };

            let mut rows: Vec<Record> = self.records.clone();
            if reversed {
                rows.reverse();
            }
            let rows = rows.into_iter().filter(|r| match after {
                None => true,
                Some(a) if reversed => r.id < a,
                Some(a) => r.id > a,
            });

            Ok(match limit {
                Some(l) => rows.take(l).collect(),
                None => rows.collect(),
            })
        }

        fn cursor_for(&self, record: &Record) -> PagingCursor {
            let mut c = PagingCursor::new();
            c.set("id", json!(record.id), false);
            c
        }
    }

    fn ids(page: &Page) -> Vec<u64> {
        page.records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_first_page_has_next_only() {
        let mut src = VecSource::new(&[1, 2, 3, 4, 5]);
        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(None, 2, None)
            .unwrap();

        assert_eq!(ids(&page), vec![1, 2]);
        assert!(page.prev.is_none());
        assert_eq!(page.next.as_ref().unwrap().values()[0], json!(2));
        assert_eq!(src.fetch_log, vec![Some(3)]);
    }

    #[test]
    fn test_last_page_has_prev_only() {
        let mut src = VecSource::new(&[1, 2, 3, 4, 5]);
        let mut cursor = PagingCursor::new();
        cursor.set("id", json!(4), false);

        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(Some(&cursor), 2, None)
            .unwrap();

        assert_eq!(ids(&page), vec![5]);
        assert!(page.next.is_none());
        let prev = page.prev.unwrap();
        assert!(prev.r_order);
        assert_eq!(prev.values()[0], json!(5));
    }

    #[test]
    fn test_reverse_page_restores_order() {
        let mut src = VecSource::new(&[1, 2, 3, 4, 5]);
        let mut cursor = PagingCursor::new();
        cursor.set("id", json!(5), false);
        cursor.r_order = true;

        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(Some(&cursor), 2, None)
            .unwrap();

        assert_eq!(ids(&page), vec![3, 4]);
        assert!(page.next.is_some());
        assert!(page.prev.is_some());

        // going back from the first row reaches the start
        let mut src2 = VecSource::new(&[1, 2, 3, 4, 5]);
        let page = PageExecutor::new(&mut src2, PageOptions::default())
            .execute(page.prev.as_ref(), 2, None)
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        assert!(page.prev.is_none());
        assert!(page.next.is_some());
    }

    #[test]
    fn test_unlimited() {
        let mut src = VecSource::new(&[1, 2, 3]);
        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(None, 0, None)
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3]);
        assert!(page.next.is_none());
        assert_eq!(src.fetch_log, vec![None]);
    }

    #[test]
    fn test_unlimited_from_cursor_sets_no_cursors() {
        let mut cursor = PagingCursor::new();
        cursor.set("id", json!(2), false);

        let mut src = VecSource::new(&[1, 2, 3, 4]);
        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(Some(&cursor), 0, None)
            .unwrap();
        assert_eq!(ids(&page), vec![3, 4]);
        assert!(page.prev.is_none() && page.next.is_none());

        cursor.r_order = true;
        let mut src = VecSource::new(&[1, 2, 3, 4]);
        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(Some(&cursor), 0, None)
            .unwrap();
        assert_eq!(ids(&page), vec![1]);
        assert!(page.prev.is_none() && page.next.is_none());
    }

    #[test]
    fn test_check_refetches_until_full() {
        let mut src = VecSource::new(&(1..=30).collect::<Vec<_>>());
        let check = RecordCheck::new(|r| Ok(r.id % 5 == 0));

        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(None, 3, Some(&check))
            .unwrap();

        assert_eq!(ids(&page), vec![5, 10, 15]);
        assert!(page.next.is_some());
        assert!(page.fetches > 1);
        // refetches ask for at least the minimum batch
        assert!(src.fetch_log[1..].iter().all(|l| l.unwrap() >= 11));
    }

    #[test]
    fn test_check_exhausts_source() {
        let mut src = VecSource::new(&[1, 2, 3, 4]);
        let check = RecordCheck::new(|r| Ok(r.id == 3));

        let page = PageExecutor::new(&mut src, PageOptions::default())
            .execute(None, 2, Some(&check))
            .unwrap();

        assert_eq!(ids(&page), vec![3]);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_refetch_budget() {
        let mut src = VecSource::new(&(1..=100).collect::<Vec<_>>());
        let check = RecordCheck::new(|_| Ok(false));
        let options = PageOptions {
            max_refetches: 3,
            min_ensure_fetch_limit: 1,
        };

        let page = PageExecutor::new(&mut src, options)
            .execute(None, 2, Some(&check))
            .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.fetches, 3);
    }

    #[test]
    fn test_check_error_propagates() {
        let mut src = VecSource::new(&[1, 2]);
        let check = RecordCheck::new(|_| Err(QueryError::NotSupported("check".into())));
        let err = PageExecutor::new(&mut src, PageOptions::default())
            .execute(None, 2, Some(&check))
            .unwrap_err();
        assert!(matches!(err, QueryError::NotSupported(_)));
    }
}
