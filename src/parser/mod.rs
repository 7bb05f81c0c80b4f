pub mod content;
pub mod dom;
pub mod extract;
pub mod headings;
pub mod nest;
pub mod normalize;
pub mod sections;
pub mod serialize;

use crate::db::ScrapedPage;
use extract::ExtractedData;

/// Full pipeline for one page: HTML → DOM → section forest → extracted data.
pub fn process_page(page: &ScrapedPage) -> ExtractedData {
    let dom = dom::parse_document(&page.html);
    extract::extract_all(
        &page.pmcid,
        &page.url,
        page.page_data_id,
        &page.catalog_title,
        &dom,
    )
}
