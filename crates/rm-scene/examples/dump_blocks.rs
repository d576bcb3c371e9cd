//! Simple decoder to inspect reMarkable v6 `.rm` files.
//!
//! Run with `RUST_LOG=debug` to see skipped blocks and unknown fields.

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use rm_scene::{
    Block, BlockData, PageLayout, TextDocument, read_blocks, validate_blocks,
};

fn describe(block: &Block) -> String {
    match &block.data {
        BlockData::AuthorIds(ids) => format!("{} author(s)", ids.authors.len()),
        BlockData::MigrationInfo(info) => {
            format!("migration {} (device: {})", info.migration_id, info.is_device)
        }
        BlockData::PageInfo(info) => format!(
            "loads={} merges={} chars={} lines={}",
            info.loads_count, info.merges_count, info.text_chars_count, info.text_lines_count
        ),
        BlockData::SceneInfo(info) => format!("current layer {}", info.current_layer.value),
        BlockData::TreeNode(node) => {
            format!("node {} {:?} visible={}", node.node_id, node.label.value, node.visible.value)
        }
        BlockData::SceneTree(tree) => format!("{} -> parent {}", tree.tree_id, tree.parent_id),
        BlockData::GlyphItem(item) => match item.value() {
            Some(glyph) => format!("{} highlight {:?} {:?}", item.item_id(), glyph.color, glyph.text),
            None => format!("{} deleted highlight", item.item_id()),
        },
        BlockData::GroupItem(item) => match item.value() {
            Some(node) => format!("{} in {} -> node {}", item.item_id(), item.parent_id, node),
            None => format!("{} deleted group", item.item_id()),
        },
        BlockData::LineItem(item) => match item.value() {
            Some(line) => format!(
                "{} in {}: {:?} {} ({} points)",
                item.item_id(),
                item.parent_id,
                line.tool,
                line.color.hex(),
                line.points.len()
            ),
            None => format!("{} deleted stroke", item.item_id()),
        },
        BlockData::TombstoneItem(item) => format!("{} tombstone", item.item_id()),
        BlockData::RootText(text) => format!(
            "{} fragments at ({:.1}, {:.1}) width {:.1}",
            text.items.len(),
            text.pos_x,
            text.pos_y,
            text.width
        ),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: dump_blocks <file.rm>");
        return ExitCode::FAILURE;
    };

    println!("Reading: {}", path);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("cannot open {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let mut stream = read_blocks(BufReader::new(file));
    let mut blocks = Vec::new();
    let mut failed = false;
    for result in stream.by_ref() {
        match result {
            Ok(block) => blocks.push(block),
            Err(e) => {
                eprintln!("decode error: {}", e);
                failed = true;
            }
        }
    }

    println!("\n=== Blocks ({}) ===", blocks.len());
    for block in &blocks {
        let extra = if block.extra_data.is_empty() {
            String::new()
        } else {
            format!(" [+{} unknown bytes]", block.extra_data.len())
        };
        println!(
            "@{:<8} v{} {:<14} {}{}",
            block.header.offset,
            block.header.current_version,
            block.kind().name(),
            describe(block),
            extra
        );
    }
    for skipped in stream.skipped() {
        println!(
            "@{:<8} skipped unknown block type {:#04x} ({} bytes)",
            skipped.header.offset, skipped.header.block_type, skipped.header.length
        );
    }

    let layout = PageLayout::from_blocks(&blocks);
    println!("\n=== Page ===");
    println!("Size: {}x{}", layout.width, layout.height);
    println!("Offset: ({:.1}, {:.1})", layout.x_offset, layout.y_offset);
    if let Err(e) = validate_blocks(&blocks) {
        println!("Validation: {}", e);
    }

    for block in &blocks {
        if let BlockData::RootText(text) = &block.data {
            println!("\n=== Text ===");
            match TextDocument::from_root_text(text) {
                Ok(document) => {
                    for paragraph in &document.paragraphs {
                        println!("[{:?}] {}", paragraph.style.value, paragraph);
                    }
                }
                Err(e) => eprintln!("text error: {}", e),
            }
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
