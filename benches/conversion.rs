//! Benchmarks for the JATS conversion pipeline.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use kiji::convert_article;

const ARTICLE_BYTES: &[u8] = include_bytes!("../tests/fixtures/article.xml");

/// Generate a large article with `sections` body sections, each holding a
/// handful of paragraphs with marks and citations.
fn generate_article(sections: usize) -> Vec<u8> {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <article xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
         <front><journal-meta><journal-title-group>\
         <journal-title>Synthetic Journal</journal-title></journal-title-group>\
         </journal-meta><article-meta>\
         <title-group><article-title>Synthetic article</article-title></title-group>\
         </article-meta></front><body>",
    );
    for s in 0..sections {
        xml.push_str(&format!("<sec id=\"s{s}\"><title>Section {s}</title>"));
        for p in 0..5 {
            xml.push_str(&format!(
                "<p id=\"p{s}-{p}\">Paragraph with <bold>marks</bold> and \
                 <italic>emphasis</italic>, citing <xref ref-type=\"bibr\" \
                 rid=\"r{}\">[{}]</xref> as evidence.</p>",
                s % 20,
                s % 20
            ));
        }
        xml.push_str("</sec>");
    }
    xml.push_str("</body><back><ref-list>");
    for r in 0..20 {
        xml.push_str(&format!(
            "<ref id=\"r{r}\"><label>{r}</label><element-citation>\
             <person-group person-group-type=\"author\"><name>\
             <surname>Author{r}</surname><given-names>A.</given-names>\
             </name></person-group>\
             <article-title>Reference {r}</article-title>\
             <source>Synthetic Proceedings</source><year>2020</year>\
             </element-citation></ref>"
        ));
    }
    xml.push_str("</ref-list></back></article>");
    xml.into_bytes()
}

fn bench_convert_fixture(c: &mut Criterion) {
    c.bench_function("convert_fixture_article", |b| {
        b.iter(|| convert_article(ARTICLE_BYTES).unwrap());
    });
}

fn bench_convert_large(c: &mut Criterion) {
    let xml = generate_article(200);
    c.bench_function("convert_large_article", |b| {
        b.iter(|| convert_article(&xml).unwrap());
    });
}

criterion_group!(benches, bench_convert_fixture, bench_convert_large);
criterion_main!(benches);
