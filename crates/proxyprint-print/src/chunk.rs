// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job chunk planning.
//
// A proxy print request selects pages from one or more queued documents.
// Documents may use different media, and a single printer submission can
// only carry one media, so the selection is cut into chunks wherever the
// media changes.  Every selected page lands in exactly one chunk.
//
// Three entry points share the same chunk structures:
//
//   - whole selection:  ordered job ranges over several documents, with
//                       media-boundary detection;
//   - single document:  one document and an explicit range string;
//   - pre-built:        one chunk from a media/page-count pair (e.g. the
//                       copies of a job ticket).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::rules::{CostCalculator, NumberUpRule, PrinterChoices};
use proxyprint_core::types::Amount;

use crate::media::{AUTO_SOURCE, MEDIA_SOURCE_ATTR, MediaSourceChoice, PrinterMediaSources};

/// Inclusive, 1-based page bounds within one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub begin: u32,
    pub end: u32,
    /// Index of the source document, `None` for pre-built chunks.
    pub document: Option<usize>,
}

impl PageRange {
    pub fn pages(&self) -> u32 {
        self.end - self.begin + 1
    }
}

/// Orientation data of a source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOrientation {
    /// Rotation of the first page as stored in the PDF (0, 90, 180, 270).
    pub rotation: i32,
    /// Whether the content is landscape.
    pub landscape: bool,
}

/// A queued document the user may select pages from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub title: String,
    pub pages: u32,
    /// IPP media keyword of the document's page size.
    pub media: String,
    pub drm: bool,
    pub orientation: PageOrientation,
}

/// Pages selected from one document.  An empty range string selects all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRange {
    pub document: usize,
    pub ranges: String,
}

impl JobRange {
    pub fn all(document: usize) -> Self {
        Self {
            document,
            ranges: String::new(),
        }
    }
}

/// The documents of a print request and the pages selected from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSelection {
    pub documents: Vec<SourceDocument>,
    pub job_ranges: Vec<JobRange>,
    /// Whether the selection is unmodified since the documents were queued.
    pub vanilla: bool,
}

impl DocumentSelection {
    /// Build a selection from a range string over the concatenated pages of
    /// all documents.  An empty string selects everything.
    pub fn from_page_selection(
        documents: Vec<SourceDocument>,
        ranges: &str,
        vanilla: bool,
    ) -> Result<Self> {
        if ranges.trim().is_empty() {
            let job_ranges = (0..documents.len()).map(JobRange::all).collect();
            return Ok(Self {
                documents,
                job_ranges,
                vanilla,
            });
        }

        let total: u32 = documents.iter().map(|d| d.pages).sum();
        let mut job_ranges: Vec<JobRange> = Vec::new();

        for (begin, end) in parse_page_ranges(ranges, total)? {
            let mut offset = 0;
            for (index, doc) in documents.iter().enumerate() {
                let first = offset + 1;
                let last = offset + doc.pages;
                offset = last;

                let lo = begin.max(first);
                let hi = end.min(last);
                if lo > hi {
                    continue;
                }
                let token = range_token(lo - first + 1, hi - first + 1);
                match job_ranges.last_mut() {
                    Some(previous) if previous.document == index => {
                        previous.ranges.push(',');
                        previous.ranges.push_str(&token);
                    }
                    _ => job_ranges.push(JobRange {
                        document: index,
                        ranges: token,
                    }),
                }
            }
        }

        Ok(Self {
            documents,
            job_ranges,
            vanilla,
        })
    }
}

/// A media-homogeneous unit submitted to the printer as one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChunk {
    pub ranges: Vec<PageRange>,
    pub media: String,
    pub media_source: Option<String>,
    pub drm: bool,
    pub job_name: String,
    /// Pages contributed by each job range, in order.
    pub job_pages: Vec<u32>,
}

impl JobChunk {
    pub fn page_count(&self) -> u32 {
        self.ranges.iter().map(PageRange::pages).sum()
    }
}

/// The chunks of one print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    chunks: Vec<JobChunk>,
    landscape: bool,
    orientation: Option<PageOrientation>,
    options: PrinterChoices,
}

impl ChunkPlan {
    pub fn chunks(&self) -> &[JobChunk] {
        &self.chunks
    }

    /// Whether any contributing document is landscape.
    pub fn is_landscape(&self) -> bool {
        self.landscape
    }

    /// Orientation of the first contributing document.
    pub fn orientation(&self) -> Option<PageOrientation> {
        self.orientation
    }

    /// Printer options to submit with every chunk.
    pub fn options(&self) -> &PrinterChoices {
        &self.options
    }

    pub fn total_pages(&self) -> u32 {
        self.chunks.iter().map(JobChunk::page_count).sum()
    }

    /// Cost of `copies` copies of the whole plan.  Each chunk is priced
    /// with its own media on top of the plan options.
    pub fn job_cost(&self, calculator: &CostCalculator, copies: u32) -> Amount {
        self.chunks
            .iter()
            .map(|chunk| {
                let mut choices = self.options.clone();
                choices.insert("media".into(), chunk.media.clone());
                calculator.calc_job_cost(&choices, chunk.page_count(), copies)
            })
            .sum()
    }

    /// Number-up rule query for this plan's geometry.
    pub fn number_up_template(&self, user_rotation: i32, number_up: &str) -> NumberUpRule {
        let rotation = self.orientation.map(|o| o.rotation).unwrap_or(0);
        NumberUpRule::template(self.landscape, rotation, user_rotation, number_up)
    }
}

/// Splits print requests into chunks.
///
/// Holds only immutable settings; one planner may serve any number of
/// concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlanner {
    media_sources: Option<PrinterMediaSources>,
    options: PrinterChoices,
}

impl ChunkPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a media source to every chunk from the target printer's trays.
    pub fn with_media_sources(mut self, sources: PrinterMediaSources) -> Self {
        self.media_sources = Some(sources);
        self
    }

    /// Base printer options for the submission.
    pub fn with_options(mut self, options: PrinterChoices) -> Self {
        self.options = options;
        self
    }

    /// Plan a whole selection, starting a new chunk at every media change.
    #[instrument(skip_all, fields(documents = selection.documents.len(), job_ranges = selection.job_ranges.len()))]
    pub fn plan_selection(&self, selection: &DocumentSelection) -> Result<ChunkPlan> {
        if !selection.vanilla {
            return Err(ProxyPrintError::NotVanilla);
        }

        let mut chunks = Vec::new();
        let mut current: Option<ChunkBuilder> = None;
        let mut landscape = false;
        let mut orientation = None;

        for job_range in &selection.job_ranges {
            let doc = selection.documents.get(job_range.document).ok_or_else(|| {
                ProxyPrintError::InvalidPageRange(format!(
                    "no document at index {}",
                    job_range.document
                ))
            })?;
            let atoms = parse_page_ranges(&job_range.ranges, doc.pages)?;

            landscape |= doc.orientation.landscape;
            orientation.get_or_insert(doc.orientation);

            let mut builder = match current.take() {
                Some(builder) if builder.media == doc.media => builder,
                previous => {
                    if let Some(done) = previous {
                        chunks.push(done.finish());
                    }
                    ChunkBuilder::new(&doc.media)
                }
            };
            builder.add(
                Some(job_range.document),
                &doc.title,
                doc.drm,
                &job_range.ranges,
                &atoms,
            );
            current = Some(builder);
        }

        if let Some(done) = current {
            chunks.push(done.finish());
        }
        if chunks.is_empty() {
            return Err(ProxyPrintError::InvalidPageRange("nothing selected".into()));
        }

        debug!(chunks = chunks.len(), "selection planned");
        self.finish_plan(chunks, landscape, orientation)
    }

    /// Plan one identified document with an explicit range string.
    pub fn plan_document(
        &self,
        document: &SourceDocument,
        index: usize,
        ranges: &str,
        vanilla: bool,
    ) -> Result<ChunkPlan> {
        if !vanilla {
            return Err(ProxyPrintError::NotVanilla);
        }
        let atoms = parse_page_ranges(ranges, document.pages)?;
        let mut builder = ChunkBuilder::new(&document.media);
        builder.add(Some(index), &document.title, document.drm, ranges, &atoms);
        self.finish_plan(
            vec![builder.finish()],
            document.orientation.landscape,
            Some(document.orientation),
        )
    }

    /// Plan a single chunk of `pages` pages on `media`.
    pub fn plan_prebuilt(&self, title: &str, media: &str, pages: u32) -> Result<ChunkPlan> {
        if pages == 0 {
            return Err(ProxyPrintError::InvalidPageRange("no pages to print".into()));
        }
        let mut builder = ChunkBuilder::new(media);
        builder.add(None, title, false, "", &[(1, pages)]);
        self.finish_plan(vec![builder.finish()], false, None)
    }

    fn finish_plan(
        &self,
        chunks: Vec<JobChunk>,
        landscape: bool,
        orientation: Option<PageOrientation>,
    ) -> Result<ChunkPlan> {
        let mut options = self.options.clone();
        let chunks = match &self.media_sources {
            None => chunks,
            Some(sources) => chunks
                .into_iter()
                .map(|chunk| {
                    let choice = sources.resolve(&chunk.media)?;
                    if choice == MediaSourceChoice::Auto {
                        options.insert(MEDIA_SOURCE_ATTR.into(), AUTO_SOURCE.into());
                    }
                    Ok(JobChunk {
                        media_source: Some(choice.keyword().to_string()),
                        ..chunk
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(ChunkPlan {
            chunks,
            landscape,
            orientation,
            options,
        })
    }
}

/// Accumulates the job ranges of one chunk.
struct ChunkBuilder {
    media: String,
    ranges: Vec<PageRange>,
    tokens: Vec<String>,
    first_title: Option<String>,
    documents: BTreeSet<usize>,
    drm: bool,
    job_pages: Vec<u32>,
}

impl ChunkBuilder {
    fn new(media: &str) -> Self {
        Self {
            media: media.to_string(),
            ranges: Vec::new(),
            tokens: Vec::new(),
            first_title: None,
            documents: BTreeSet::new(),
            drm: false,
            job_pages: Vec::new(),
        }
    }

    fn add(
        &mut self,
        document: Option<usize>,
        title: &str,
        drm: bool,
        token: &str,
        atoms: &[(u32, u32)],
    ) {
        let token: String = token.chars().filter(|c| !c.is_whitespace()).collect();
        self.tokens
            .push(if token.is_empty() { "1-".to_string() } else { token });
        self.first_title.get_or_insert_with(|| title.to_string());
        if let Some(index) = document {
            self.documents.insert(index);
        }
        self.drm |= drm;

        let mut pages = 0;
        for &(begin, end) in atoms {
            self.ranges.push(PageRange {
                begin,
                end,
                document,
            });
            pages += end - begin + 1;
        }
        self.job_pages.push(pages);
    }

    fn finish(self) -> JobChunk {
        let mut job_name = format!(
            "({}) {}",
            self.tokens.join(","),
            self.first_title.unwrap_or_default()
        );
        if self.documents.len() > 1 {
            job_name.push_str(&format!(" (+{})", self.documents.len() - 1));
        }
        JobChunk {
            ranges: self.ranges,
            media: self.media,
            media_source: None,
            drm: self.drm,
            job_name,
            job_pages: self.job_pages,
        }
    }
}

/// Parse a page-range string against a document of `pages` pages.
///
/// Tokens are `n`, `a-b`, `a-` (to the last page) and `-b` (from page 1),
/// separated by commas.  The empty string selects all pages.  Token order is
/// kept; overlapping tokens are rejected.
pub fn parse_page_ranges(ranges: &str, pages: u32) -> Result<Vec<(u32, u32)>> {
    let invalid = |why: String| ProxyPrintError::InvalidPageRange(why);
    let compact: String = ranges.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.is_empty() {
        if pages == 0 {
            return Err(invalid("document has no pages".into()));
        }
        return Ok(vec![(1, pages)]);
    }

    let mut parsed: Vec<(u32, u32)> = Vec::new();
    for token in compact.split(',') {
        if token.is_empty() {
            return Err(invalid(format!("empty token in {ranges:?}")));
        }
        let (begin, end) = match token.split_once('-') {
            None => {
                let page = parse_page(token)?;
                (page, page)
            }
            Some((from, to)) => {
                let begin = if from.is_empty() { 1 } else { parse_page(from)? };
                let end = if to.is_empty() { pages } else { parse_page(to)? };
                (begin, end)
            }
        };

        if begin > pages {
            return Err(ProxyPrintError::PageOutOfBounds { page: begin, pages });
        }
        if end > pages {
            return Err(ProxyPrintError::PageOutOfBounds { page: end, pages });
        }
        if begin > end {
            return Err(invalid(format!("reversed range {token:?}")));
        }
        if parsed.iter().any(|&(b, e)| begin <= e && b <= end) {
            return Err(invalid(format!("overlapping range {token:?}")));
        }
        parsed.push((begin, end));
    }
    Ok(parsed)
}

fn parse_page(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(0) => Err(ProxyPrintError::InvalidPageRange(
            "page numbers start at 1".into(),
        )),
        Ok(page) => Ok(page),
        Err(_) => Err(ProxyPrintError::InvalidPageRange(format!(
            "not a page number: {s:?}"
        ))),
    }
}

fn range_token(begin: u32, end: u32) -> String {
    if begin == end {
        begin.to_string()
    } else {
        format!("{begin}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const A4: &str = "iso_a4_210x297mm";
    const LETTER: &str = "na_letter_8.5x11in";

    fn doc(title: &str, pages: u32, media: &str) -> SourceDocument {
        SourceDocument {
            title: title.into(),
            pages,
            media: media.into(),
            drm: false,
            orientation: PageOrientation::default(),
        }
    }

    fn sources(managed: bool) -> PrinterMediaSources {
        let attrs: HashMap<String, String> = [
            ("media-source-supported", "auto, tray-1, tray-2"),
            ("media-source-media", "tray-1=iso_a4_210x297mm, tray-2=na_letter_8.5x11in"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        PrinterMediaSources::from_attributes("office", &attrs, managed)
    }

    /// Every (document, page) pair covered by the plan, with multiplicity.
    fn covered_pages(plan: &ChunkPlan) -> Vec<(usize, u32)> {
        let mut pages: Vec<(usize, u32)> = plan
            .chunks()
            .iter()
            .flat_map(|c| c.ranges.iter())
            .flat_map(|r| (r.begin..=r.end).map(move |p| (r.document.unwrap_or(0), p)))
            .collect();
        pages.sort();
        pages
    }

    #[test]
    fn media_change_splits_chunks() {
        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 3, A4), doc("B", 2, LETTER)],
            "1-5",
            true,
        )
        .unwrap();
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();

        assert_eq!(plan.chunks().len(), 2);
        let first = &plan.chunks()[0];
        assert_eq!(first.media, A4);
        assert_eq!(
            first.ranges,
            vec![PageRange {
                begin: 1,
                end: 3,
                document: Some(0)
            }]
        );
        let second = &plan.chunks()[1];
        assert_eq!(second.media, LETTER);
        assert_eq!(
            second.ranges,
            vec![PageRange {
                begin: 1,
                end: 2,
                document: Some(1)
            }]
        );
        assert_eq!(plan.total_pages(), 5);
    }

    #[test]
    fn selection_is_covered_exactly_once() {
        let documents = vec![
            doc("A", 4, A4),
            doc("B", 3, A4),
            doc("C", 2, LETTER),
            doc("D", 5, A4),
        ];
        for ranges in ["", "1-14", "2-3,6-9,12", "-4,10-", "7,1,14"] {
            let selection =
                DocumentSelection::from_page_selection(documents.clone(), ranges, true).unwrap();
            let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();

            let covered = covered_pages(&plan);
            let mut deduped = covered.clone();
            deduped.dedup();
            assert_eq!(covered, deduped, "overlap for {ranges:?}");

            let expected = parse_page_ranges(ranges, 14)
                .unwrap()
                .iter()
                .map(|(b, e)| e - b + 1)
                .sum::<u32>();
            assert_eq!(covered.len() as u32, expected, "gap for {ranges:?}");

            for chunk in plan.chunks() {
                for range in &chunk.ranges {
                    let source = &documents[range.document.unwrap()];
                    assert_eq!(source.media, chunk.media);
                }
            }
        }
    }

    #[test]
    fn same_media_documents_share_a_chunk() {
        let selection = DocumentSelection {
            documents: vec![doc("Report", 4, A4), doc("Annex", 2, A4), doc("Memo", 1, A4)],
            job_ranges: vec![
                JobRange {
                    document: 0,
                    ranges: "1-2,4".into(),
                },
                JobRange::all(1),
                JobRange::all(2),
            ],
            vanilla: true,
        };
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();
        assert_eq!(plan.chunks().len(), 1);
        let chunk = &plan.chunks()[0];
        assert_eq!(chunk.job_name, "(1-2,4,1-,1-) Report (+2)");
        assert_eq!(chunk.ranges.len(), 4);
        assert_eq!(chunk.job_pages, vec![3, 2, 1]);
    }

    #[test]
    fn single_document_chunk_has_no_suffix() {
        let selection = DocumentSelection {
            documents: vec![doc("Thesis", 10, A4)],
            job_ranges: vec![
                JobRange {
                    document: 0,
                    ranges: "1-3".into(),
                },
                JobRange {
                    document: 0,
                    ranges: "7".into(),
                },
            ],
            vanilla: true,
        };
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();
        assert_eq!(plan.chunks()[0].job_name, "(1-3,7) Thesis");
    }

    #[test]
    fn media_return_opens_new_chunk() {
        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 1, A4), doc("B", 1, LETTER), doc("C", 1, A4)],
            "",
            true,
        )
        .unwrap();
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();
        let media: Vec<&str> = plan.chunks().iter().map(|c| c.media.as_str()).collect();
        assert_eq!(media, vec![A4, LETTER, A4]);
    }

    #[test]
    fn drm_landscape_and_orientation_accumulate() {
        let mut a = doc("A", 1, A4);
        a.orientation = PageOrientation {
            rotation: 90,
            landscape: false,
        };
        let mut b = doc("B", 1, A4);
        b.drm = true;
        b.orientation = PageOrientation {
            rotation: 0,
            landscape: true,
        };
        let c = doc("C", 1, LETTER);

        let selection = DocumentSelection::from_page_selection(vec![a, b, c], "", true).unwrap();
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();

        assert!(plan.chunks()[0].drm);
        assert!(!plan.chunks()[1].drm);
        assert!(plan.is_landscape());
        assert_eq!(plan.orientation().unwrap().rotation, 90);

        let template = plan.number_up_template(0, "2");
        assert!(template.landscape);
        assert_eq!(template.pdf_rotation, 90);
    }

    #[test]
    fn non_vanilla_selection_is_rejected() {
        let selection =
            DocumentSelection::from_page_selection(vec![doc("A", 3, A4)], "", false).unwrap();
        assert!(matches!(
            ChunkPlanner::new().plan_selection(&selection),
            Err(ProxyPrintError::NotVanilla)
        ));
        assert!(matches!(
            ChunkPlanner::new().plan_document(&doc("A", 3, A4), 0, "1", false),
            Err(ProxyPrintError::NotVanilla)
        ));
    }

    #[test]
    fn media_sources_are_assigned() {
        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 3, A4), doc("B", 2, LETTER)],
            "",
            true,
        )
        .unwrap();
        let plan = ChunkPlanner::new()
            .with_media_sources(sources(false))
            .plan_selection(&selection)
            .unwrap();
        assert_eq!(plan.chunks()[0].media_source.as_deref(), Some("tray-1"));
        assert_eq!(plan.chunks()[1].media_source.as_deref(), Some("tray-2"));
        assert!(!plan.options().contains_key(MEDIA_SOURCE_ATTR));
    }

    #[test]
    fn unresolvable_media_fails_the_plan() {
        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 3, A4), doc("Poster", 1, "iso_a3_297x420mm")],
            "",
            true,
        )
        .unwrap();
        let err = ChunkPlanner::new()
            .with_media_sources(sources(false))
            .plan_selection(&selection)
            .unwrap_err();
        assert!(matches!(
            err,
            ProxyPrintError::MediaSourceUnavailable { ref printer, ref media }
                if printer == "office" && media == "iso_a3_297x420mm"
        ));
    }

    #[test]
    fn externally_managed_printer_requests_auto() {
        let mut base = PrinterChoices::new();
        base.insert("sides".into(), "one-sided".into());
        let selection = DocumentSelection::from_page_selection(
            vec![doc("Poster", 1, "iso_a3_297x420mm")],
            "",
            true,
        )
        .unwrap();
        let plan = ChunkPlanner::new()
            .with_media_sources(sources(true))
            .with_options(base)
            .plan_selection(&selection)
            .unwrap();
        assert_eq!(plan.chunks()[0].media_source.as_deref(), Some(AUTO_SOURCE));
        assert_eq!(
            plan.options().get(MEDIA_SOURCE_ATTR).map(String::as_str),
            Some(AUTO_SOURCE)
        );
        assert_eq!(plan.options().get("sides").map(String::as_str), Some("one-sided"));
    }

    #[test]
    fn single_document_mode() {
        let document = doc("Slides", 8, A4);
        let plan = ChunkPlanner::new()
            .plan_document(&document, 3, "2-4, 6", true)
            .unwrap();
        assert_eq!(plan.chunks().len(), 1);
        let chunk = &plan.chunks()[0];
        assert_eq!(chunk.job_name, "(2-4,6) Slides");
        assert_eq!(chunk.page_count(), 4);
        assert!(chunk.ranges.iter().all(|r| r.document == Some(3)));
    }

    #[test]
    fn prebuilt_mode() {
        let plan = ChunkPlanner::new()
            .with_media_sources(sources(false))
            .plan_prebuilt("Ticket 17", LETTER, 12)
            .unwrap();
        let chunk = &plan.chunks()[0];
        assert_eq!(chunk.job_name, "(1-) Ticket 17");
        assert_eq!(chunk.page_count(), 12);
        assert_eq!(chunk.ranges[0].document, None);
        assert_eq!(chunk.media_source.as_deref(), Some("tray-2"));
        assert!(ChunkPlanner::new().plan_prebuilt("x", A4, 0).is_err());
    }

    #[test]
    fn page_selection_maps_onto_documents() {
        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 3, A4), doc("B", 2, A4)],
            "1,3-4",
            true,
        )
        .unwrap();
        assert_eq!(
            selection.job_ranges,
            vec![
                JobRange {
                    document: 0,
                    ranges: "1,3".into()
                },
                JobRange {
                    document: 1,
                    ranges: "1".into()
                },
            ]
        );
        let plan = ChunkPlanner::new().plan_selection(&selection).unwrap();
        assert_eq!(plan.chunks()[0].job_name, "(1,3,1) A (+1)");
    }

    #[test]
    fn job_cost_prices_each_chunk_with_its_media() {
        use proxyprint_core::rules::CostRule;

        let calculator = CostCalculator::new(
            vec![
                CostRule::new("a4", Amount::from_units(1_000)).with_choice("media", A4),
                CostRule::new("letter", Amount::from_units(2_000)).with_choice("media", LETTER),
            ],
            vec![CostRule::new("staple", Amount::from_units(500)).with_choice("finishings", "staple")],
        );
        let mut options = PrinterChoices::new();
        options.insert("finishings".into(), "staple".into());

        let selection = DocumentSelection::from_page_selection(
            vec![doc("A", 3, A4), doc("B", 2, LETTER)],
            "",
            true,
        )
        .unwrap();
        let plan = ChunkPlanner::new()
            .with_options(options)
            .plan_selection(&selection)
            .unwrap();
        assert_eq!(plan.chunks().len(), 2);

        // A4: 0.10 * 3 * 2 + 0.05 * 2, letter: 0.20 * 2 * 2 + 0.05 * 2
        assert_eq!(plan.job_cost(&calculator, 2), Amount::from_units(16_000));
    }

    #[test]
    fn parse_range_grammar() {
        assert_eq!(parse_page_ranges("", 5).unwrap(), vec![(1, 5)]);
        assert_eq!(parse_page_ranges(" 2 ", 5).unwrap(), vec![(2, 2)]);
        assert_eq!(parse_page_ranges("3-", 5).unwrap(), vec![(3, 5)]);
        assert_eq!(parse_page_ranges("-2,4", 5).unwrap(), vec![(1, 2), (4, 4)]);
        assert_eq!(parse_page_ranges("4,1-2", 5).unwrap(), vec![(4, 4), (1, 2)]);
    }

    #[test]
    fn parse_range_errors() {
        assert!(matches!(
            parse_page_ranges("6", 5),
            Err(ProxyPrintError::PageOutOfBounds { page: 6, pages: 5 })
        ));
        assert!(matches!(
            parse_page_ranges("2-9", 5),
            Err(ProxyPrintError::PageOutOfBounds { page: 9, pages: 5 })
        ));
        for bad in ["0", "3-2", "1-3,2", "a", "1,,2", "1-2-3"] {
            assert!(
                matches!(
                    parse_page_ranges(bad, 5),
                    Err(ProxyPrintError::InvalidPageRange(_))
                ),
                "{bad:?} should be invalid"
            );
        }
        assert!(parse_page_ranges("", 0).is_err());
    }
}
