/// Width of one sprite memory page in pixels.
pub const PAGE_WIDTH: u32 = 128;

/// Height of one sprite memory page in pixels.
pub const PAGE_HEIGHT: u32 = 128;

pub const DEFAULT_SPRITE_SIZE: u32 = 8;

pub const DEFAULT_PAGES: u32 = 4;

pub const MAX_PAGES: u32 = 8;

/// Pixel value of an empty (transparent) pixel.
pub const EMPTY_PIXEL: i32 = -1;

/// Paged sprite memory with a per-slot content cache for duplicate detection.
///
/// Sprites are laid out row-major across a texture `PAGE_WIDTH` wide and
/// `PAGE_HEIGHT * pages` tall. Every written slot caches a copy of its pixels so
/// [`find_sprite`](Self::find_sprite) can look sprites up by content. The lookup
/// returns the lowest matching index, so it depends only on what is in memory
/// and not on the order the sprites were written.
#[derive(Debug, Clone)]
pub struct SpriteMemory {
    sprite_width: u32,
    sprite_height: u32,
    pages: u32,
    colors_per_sprite: u32,
    width: u32,
    height: u32,
    pixels: Vec<i32>,
    cache: Vec<Option<Box<[i32]>>>,
}

impl Default for SpriteMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteMemory {
    pub fn new() -> Self {
        let mut memory = Self {
            sprite_width: DEFAULT_SPRITE_SIZE,
            sprite_height: DEFAULT_SPRITE_SIZE,
            pages: 0,
            colors_per_sprite: 8,
            width: 0,
            height: 0,
            pixels: Vec::new(),
            cache: Vec::new(),
        };
        memory.set_pages(DEFAULT_PAGES);
        memory
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Resizes memory to `pages` (clamped to 1..=8). Clears all sprites.
    pub fn set_pages(&mut self, pages: u32) {
        if self.pages == pages {
            return;
        }

        self.pages = pages.clamp(1, MAX_PAGES);

        self.width = PAGE_WIDTH.div_ceil(self.sprite_width) * self.sprite_width;
        self.height = (PAGE_HEIGHT * self.pages).div_ceil(self.sprite_height) * self.sprite_height;
        self.pixels = vec![EMPTY_PIXEL; (self.width * self.height) as usize];
        self.cache = vec![None; self.total_sprites()];

        tracing::debug!(
            "Sprite memory resized to {} pages ({}x{}, {} sprites)",
            self.pages,
            self.width,
            self.height,
            self.cache.len()
        );
    }

    pub fn colors_per_sprite(&self) -> u32 {
        self.colors_per_sprite
    }

    /// Clamped to 1..=16.
    pub fn set_colors_per_sprite(&mut self, value: u32) {
        self.colors_per_sprite = value.clamp(1, 16);
    }

    pub fn sprite_size(&self) -> (u32, u32) {
        (self.sprite_width, self.sprite_height)
    }

    /// Texture size in pixels.
    pub fn texture_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of sprites memory can hold.
    pub fn total_sprites(&self) -> usize {
        ((self.width / self.sprite_width) * (self.height / self.sprite_height)) as usize
    }

    /// Number of slots that have been written.
    pub fn sprites_in_memory(&self) -> usize {
        self.cache.iter().filter(|entry| entry.is_some()).count()
    }

    /// True if every pixel is empty.
    pub fn is_empty(pixels: &[i32]) -> bool {
        pixels.iter().all(|p| *p < 0)
    }

    pub fn is_empty_at(&self, index: usize) -> bool {
        self.cache.get(index).is_none_or(|entry| entry.is_none())
    }

    /// First slot that has never been written.
    pub fn next_empty_id(&self) -> Option<usize> {
        self.cache.iter().position(|entry| entry.is_none())
    }

    /// Writes a sprite. Negative indices are ignored, indices past the end are
    /// clamped to the last slot.
    pub fn update_sprite_at(&mut self, index: i32, pixels: &[i32]) {
        if index < 0 {
            return;
        }

        let index = (index as usize).min(self.total_sprites().saturating_sub(1));
        let (x, y) = self.sprite_origin(index);
        let sprite_len = (self.sprite_width * self.sprite_height) as usize;

        for row in 0..self.sprite_height {
            let src_start = (row * self.sprite_width) as usize;
            if src_start >= pixels.len() {
                break;
            }
            let src_end = (src_start + self.sprite_width as usize).min(pixels.len());
            let dst_start = ((y + row) * self.width + x) as usize;
            self.pixels[dst_start..dst_start + (src_end - src_start)]
                .copy_from_slice(&pixels[src_start..src_end]);
        }

        let mut cached = vec![EMPTY_PIXEL; sprite_len];
        let copied = pixels.len().min(sprite_len);
        cached[..copied].copy_from_slice(&pixels[..copied]);
        self.cache[index] = Some(cached.into_boxed_slice());
    }

    /// Reads a sprite. Index -1 (or any negative index) yields an empty sprite.
    pub fn read_sprite_at(&self, index: i32) -> Vec<i32> {
        let sprite_len = (self.sprite_width * self.sprite_height) as usize;
        if index < 0 || index as usize >= self.total_sprites() {
            return vec![EMPTY_PIXEL; sprite_len];
        }

        let (x, y) = self.sprite_origin(index as usize);
        let mut out = Vec::with_capacity(sprite_len);
        for row in 0..self.sprite_height {
            let start = ((y + row) * self.width + x) as usize;
            out.extend_from_slice(&self.pixels[start..start + self.sprite_width as usize]);
        }
        out
    }

    /// Lowest index whose cached content equals `pixels`.
    ///
    /// With `empty_check`, empty sprites are never matched.
    pub fn find_sprite(&self, pixels: &[i32], empty_check: bool) -> Option<usize> {
        if empty_check && Self::is_empty(pixels) {
            return None;
        }
        self.find_sprite_by(pixels, |a, b| a == b)
    }

    /// Lowest index whose cached content satisfies `eq(cached, pixels)`.
    pub fn find_sprite_by<F>(&self, pixels: &[i32], eq: F) -> Option<usize>
    where
        F: Fn(&[i32], &[i32]) -> bool,
    {
        let sprite_len = (self.sprite_width * self.sprite_height) as usize;
        let normalized: Vec<i32>;
        let probe = if pixels.len() == sprite_len {
            pixels
        } else {
            let mut padded = vec![EMPTY_PIXEL; sprite_len];
            let copied = pixels.len().min(sprite_len);
            padded[..copied].copy_from_slice(&pixels[..copied]);
            normalized = padded;
            &normalized
        };

        self.cache
            .iter()
            .position(|entry| entry.as_deref().is_some_and(|cached| eq(cached, probe)))
    }

    /// Raw texture pixels, row-major.
    pub fn pixels(&self) -> &[i32] {
        &self.pixels
    }

    fn sprite_origin(&self, index: usize) -> (u32, u32) {
        let columns = (self.width / self.sprite_width) as usize;
        let x = (index % columns) as u32 * self.sprite_width;
        let y = (index / columns) as u32 * self.sprite_height;
        (x, y)
    }
}
