use graphcsv::{boundaries_to_skip, compute_end_block, new_boundary, BlockRange};

fn range(start: u64, end_exclusive: u64) -> BlockRange {
    BlockRange::new(start, end_exclusive)
}

#[test]
fn new_boundary_contains_block() {
    let cases = [
        ("start of boundary, size 10", 10, 0, range(0, 10)),
        ("middle of boundary, size 10", 10, 7, range(0, 10)),
        ("last block of boundary, size 10", 10, 9, range(0, 10)),
        ("end block of boundary, size 10", 10, 10, range(10, 20)),
        ("start of boundary, size 100", 100, 0, range(0, 100)),
        ("middle of boundary, size 100", 100, 73, range(0, 100)),
        ("last block of boundary, size 100", 100, 99, range(0, 100)),
        ("end block of boundary, size 100", 100, 100, range(100, 200)),
    ];

    for (name, size, block, want) in cases {
        assert_eq!(want, new_boundary(block, size), "{name}");
    }
}

#[test]
fn compute_end_block_rounds_up() {
    assert_eq!(200, compute_end_block(100, 100));
    assert_eq!(200, compute_end_block(123, 100));
}

#[test]
fn boundaries_to_skip_between_active_and_target() {
    let no_skip: Vec<BlockRange> = Vec::new();

    assert_eq!(no_skip, boundaries_to_skip(&range(0, 100), 98, 100));
    assert_eq!(no_skip, boundaries_to_skip(&range(0, 100), 100, 100));
    assert_eq!(no_skip, boundaries_to_skip(&range(0, 100), 107, 100));
    assert_eq!(no_skip, boundaries_to_skip(&range(0, 100), 199, 100));

    assert_eq!(
        vec![range(100, 200)],
        boundaries_to_skip(&range(2, 100), 200, 100)
    );

    assert_eq!(
        vec![
            range(100, 200),
            range(200, 300),
            range(300, 400),
            range(400, 500),
            range(500, 600),
            range(600, 700),
        ],
        boundaries_to_skip(&range(4, 100), 763, 100)
    );
}

#[test]
fn every_block_lands_in_exactly_one_boundary() {
    for size in [1u64, 7, 100, 1000] {
        for block in [0u64, 1, 99, 100, 101, 999, 1000, 12345] {
            let boundary = new_boundary(block, size);
            assert!(boundary.contains(block), "size {size} block {block}");
            assert_eq!(boundary.start % size, 0);
            assert_eq!(boundary.end_exclusive - boundary.start, size);
            assert!(!boundary.next(size).contains(block));
        }
    }
}

#[test]
fn file_names_are_zero_padded_inclusive_ranges() {
    assert_eq!("0000000000-0000000099", range(0, 100).file_name());
    assert_eq!("0000000400-0000000499", range(400, 500).file_name());
    assert_eq!("0000000900-0000000949", range(900, 950).file_name());
}
