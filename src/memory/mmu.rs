//! Memory management unit implemented
//! with a two-level page table

const WORD_WIDTH: usize = 32;
const FIRST_LEVEL_WIDTH: usize = 10;
const SECOND_LEVEL_WIDTH: usize = 10;
const PAGE_WIDTH: usize = 12;

const FIRST_LEVEL_SIZE: usize = 1 << FIRST_LEVEL_WIDTH;
const SECOND_LEVEL_SIZE: usize = 1 << SECOND_LEVEL_WIDTH;
pub const PAGE_SIZE: usize = 1 << PAGE_WIDTH;

// Defines page type
type PageType = Box<[u8; PAGE_SIZE]>;

/// Memory management unit
#[derive(Clone)]
pub struct MMU {
    // data[x][y][z] stores the byte at (x << 22) | (y << 12) | z
    // Allocated lazily
    data: Vec<Option<Vec<Option<PageType>>>>,
    allocated_pages: usize,
}

impl Default for MMU {
    fn default() -> Self {
        Self::make()
    }
}

impl std::fmt::Debug for MMU {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MMU").field("allocated_pages", &self.allocated_pages).finish()
    }
}

impl MMU {
    /// Make a new MMU
    pub fn make() -> Self {
        Self { data: vec![None; FIRST_LEVEL_SIZE], allocated_pages: 0 }
    }

    /// The first-level index of the address
    pub fn get_first_level_index(address: u32) -> usize {
        (address >> (WORD_WIDTH - FIRST_LEVEL_WIDTH)) as usize
    }
    /// The second-level index of the address
    pub fn get_second_level_index(address: u32) -> usize {
        ((address >> (WORD_WIDTH - FIRST_LEVEL_WIDTH - SECOND_LEVEL_WIDTH))
            & ((SECOND_LEVEL_SIZE - 1) as u32)) as usize
    }
    /// The offset within the page
    pub fn get_page_offset(address: u32) -> usize {
        (address & ((PAGE_SIZE - 1) as u32)) as usize
    }

    /// Allocate a page of memory at the given address.
    /// Returns true iff a new page was allocated
    pub fn allocate_page(&mut self, address: u32) -> bool {
        let (i, j) = (
            Self::get_first_level_index(address),
            Self::get_second_level_index(address),
        );

        let second_level = self.data[i].get_or_insert_with(|| vec![None; SECOND_LEVEL_SIZE]);
        if second_level[j].is_none() {
            second_level[j] = Some(Box::new([0; PAGE_SIZE]));
            self.allocated_pages += 1;
            true
        } else {
            false
        }
    }

    /// Number of pages currently backed
    pub fn allocated_pages(&self) -> usize {
        self.allocated_pages
    }

    /// Set the byte at the given address, allocating its page on demand
    pub fn set8(&mut self, address: u32, byte: u8) {
        self.allocate_page(address);
        let (i, j, k) = (
            Self::get_first_level_index(address),
            Self::get_second_level_index(address),
            Self::get_page_offset(address),
        );

        if let Some(page) = self.data[i].as_mut().and_then(|l2| l2[j].as_mut()) {
            page[k] = byte;
        }
    }

    /// Get the byte at the given address; `None` if the page is unmapped
    pub fn get8(&self, address: u32) -> Option<u8> {
        let (i, j, k) = (
            Self::get_first_level_index(address),
            Self::get_second_level_index(address),
            Self::get_page_offset(address),
        );

        self.data[i].as_ref().and_then(|l2| l2[j].as_ref()).map(|page| page[k])
    }
}
