//! Pagination helpers: `Link` header parsing and the full-collection loop.

use std::time::Duration;

use crate::retry::Sleeper;

/// Extracts the `rel="last"` page number from a `Link` response header.
///
/// Example header value:
/// `<https://ats/v1/applications?page=2>; rel="next", <https://ats/v1/applications?page=17>; rel="last"`
pub fn parse_last_page(link_header: &str) -> Option<u32> {
    for part in link_header.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"last\"") {
            continue;
        }
        let url = part.split(';').next()?.trim();
        let url = url.strip_prefix('<')?.strip_suffix('>')?;
        let query = url.split_once('?')?.1;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("page=") {
                return value.parse().ok();
            }
        }
    }
    None
}

/// Fetches every page of a collection by advancing the page number until a
/// page returns fewer rows than requested. A fixed inter-page delay keeps
/// the request rate under the upstream limit. `on_page` fires after each
/// page with (page number, running total).
///
/// The short-page rule assumes the upstream never returns a full final
/// page; if the collection size is an exact multiple of `per_page`, the
/// loop costs one extra request that returns an empty page and terminates.
pub async fn fetch_all_pages<T, E, F, Fut, P>(
    per_page: usize,
    page_delay: Duration,
    sleeper: &dyn Sleeper,
    mut fetch_page: F,
    mut on_page: P,
) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T>, E>>,
    P: FnMut(u32, usize),
{
    let mut collected = Vec::new();
    let mut page = 1u32;
    loop {
        let rows = fetch_page(page).await?;
        let row_count = rows.len();
        collected.extend(rows);
        on_page(page, collected.len());
        if row_count < per_page {
            break;
        }
        page += 1;
        sleeper.sleep(page_delay).await;
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::test_support::RecordingSleeper;

    #[test]
    fn test_parse_last_page_from_link_header() {
        let header = "<https://ats/v1/applications?job_id=5&page=2>; rel=\"next\", \
                      <https://ats/v1/applications?job_id=5&page=17>; rel=\"last\"";
        assert_eq!(parse_last_page(header), Some(17));
    }

    #[test]
    fn test_parse_last_page_absent_rel_last() {
        let header = "<https://ats/v1/applications?page=2>; rel=\"next\"";
        assert_eq!(parse_last_page(header), None);
        assert_eq!(parse_last_page(""), None);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_short_page() {
        // Pages of [100, 100, 37] at per_page=100: exactly 3 requests, 237 rows.
        let sleeper = RecordingSleeper::default();
        let sizes = [100usize, 100, 37];
        let mut requests = 0u32;
        let mut pages_seen = Vec::new();

        let rows = fetch_all_pages(
            100,
            Duration::from_millis(300),
            &sleeper,
            |page| {
                requests += 1;
                let n = sizes[(page - 1) as usize];
                async move { Ok::<_, String>(vec![0u8; n]) }
            },
            |page, running| pages_seen.push((page, running)),
        )
        .await
        .unwrap();

        assert_eq!(requests, 3);
        assert_eq!(rows.len(), 237);
        assert_eq!(pages_seen, vec![(1, 100), (2, 200), (3, 237)]);
        // Two inter-page delays for three pages.
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_single_short_page_makes_one_request() {
        let sleeper = RecordingSleeper::default();
        let mut requests = 0u32;
        let rows = fetch_all_pages(
            100,
            Duration::from_millis(300),
            &sleeper,
            |_page| {
                requests += 1;
                async move { Ok::<_, String>(vec![1u8; 5]) }
            },
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(requests, 1);
        assert_eq!(rows.len(), 5);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_propagates_page_error() {
        let sleeper = RecordingSleeper::default();
        let result: Result<Vec<u8>, String> = fetch_all_pages(
            100,
            Duration::from_millis(300),
            &sleeper,
            |page| async move {
                if page == 2 {
                    Err("boom".to_string())
                } else {
                    Ok(vec![0u8; 100])
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(result, Err("boom".to_string()));
    }
}
